//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the game music core:
//! - Logging and tracing infrastructure
//! - Configuration and host capability wiring
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback crate depends
//! on. It establishes the logging conventions and the fail-fast checks that
//! make sure every host bridge is present before a track is loaded.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
