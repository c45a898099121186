//! # Music Playback Core
//!
//! Streams compressed game music into a platform device voice.
//!
//! ## Overview
//!
//! This crate handles:
//! - Decoding music files incrementally with symphonia (feature-gated codecs)
//! - Feeding 16-bit PCM to a device voice on its buffer-needed notification,
//!   looping at end of stream
//! - A play/pause/stop/volume controller that loads in the background and
//!   applies the last requested state once the voice exists
//! - Keeping exactly one music instance active at a time
//!
//! ## Modules
//!
//! - [`decoder`]: `SampleDecoder` seam and the symphonia backend
//! - [`feeder`]: streaming and full-decode PCM feeders
//! - [`source`] / [`instance`]: asset ownership and the instance state machine
//! - [`registry`]: single-active-music slot
//! - [`player`]: the facade hosts hold

pub mod config;
pub mod context;
pub mod decoder;
pub mod error;
pub mod feeder;
pub mod instance;
pub mod player;
pub mod registry;
pub mod source;

pub use config::{FeedMode, PlaybackConfig};
pub use context::PlaybackContext;
pub use decoder::{
    DecoderFactory, FormatDetector, MusicCodec, SampleConverter, SampleDecoder, SymphoniaDecoder,
    SymphoniaDecoderFactory,
};
pub use error::{PlaybackError, Result};
pub use feeder::{
    FeedStats, FeedStatus, FillOutcome, FullDecodeFeeder, PlaybackFeeder, StreamingFeeder,
};
pub use instance::{
    compose_volume, device_volume, InstanceId, InstanceState, LoadPhase, MusicInstance,
    TargetState,
};
pub use player::MusicPlayer;
pub use registry::MusicRegistry;
pub use source::MusicSource;
