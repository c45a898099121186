//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides ready-to-use implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `AudioDevice` using `cpal` output streams
//! - `AudioSettings` using a JSON preferences file
//! - `NotificationSink` logging through `tracing` or forwarding over a channel
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelNotificationSink, CpalAudioDevice, JsonSettingsStore};
//!
//! let device = CpalAudioDevice::default_output()?;
//! let settings = JsonSettingsStore::open("resources/settings.json")?;
//! let (notifier, mut notices) = ChannelNotificationSink::new();
//!
//! // Use in core configuration
//! ```

mod audio;
mod notification;
mod settings;

pub use audio::{CpalAudioDevice, CpalVoice};
pub use notification::{ChannelNotificationSink, TracingNotificationSink};
pub use settings::{AudioPreferences, JsonSettingsStore};
