//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the music
//! playback core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the game engine it
//! runs inside. Each trait is a capability the core requires but that is
//! implemented differently per platform.
//!
//! ## Traits
//!
//! ### Audio output
//! - [`AudioDevice`](playback::AudioDevice) - Creates device voices for a PCM format
//! - [`DeviceVoice`](playback::DeviceVoice) - One audible channel with a queue of PCM buffers
//!
//! ### Preferences
//! - [`AudioSettings`](storage::AudioSettings) - Global music volume
//!
//! ### User feedback
//! - [`NotificationSink`](notification::NotificationSink) - Chat/toast notices for load failures
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ |
//! | Engine-embedded | host supplied | via traits |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: voices are driven from the
//! engine thread, the load task, and the device callback context at once.

pub mod error;
pub mod notification;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use notification::{AssetKind, NoticeSeverity, NotificationSink, UserNotice};
pub use playback::{
    AudioDevice, BufferNeededHandler, ChannelLayout, DeviceVoice, PcmFormat, VoiceState,
};
pub use storage::{AudioSettings, StaticAudioSettings, MAX_VOLUME};
