//! Game music playback.
//!
//! Facade over the workspace crates so hosts depend on one package:
//!
//! - [`bridge`]: traits the host implements (audio device, settings, notices)
//! - [`runtime`]: core configuration and logging setup
//! - [`playback`]: decoding, feeding and the music instance controller
//! - [`desktop`] (`desktop-shims` feature): cpal/JSON/tracing implementations
//!   of the bridge traits
//!
//! ```ignore
//! use game_music::runtime::{config::CoreConfig, logging::{init_logging, LoggingConfig}};
//! use game_music::{MusicPlayer, PlaybackConfig};
//!
//! init_logging(LoggingConfig::default())?;
//! let core = CoreConfig::builder().content_root("resources").build()?;
//! let player = MusicPlayer::new(core, PlaybackConfig::default())?;
//! player.play("music/title.ogg");
//! ```

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;

pub use core_playback::{
    FeedMode, InstanceId, InstanceState, LoadPhase, MusicInstance, MusicPlayer, MusicRegistry,
    MusicSource, PlaybackConfig, PlaybackError, TargetState,
};
