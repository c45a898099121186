//! # Playback Configuration
//!
//! Configuration types for music feeding and instance defaults.

use serde::{Deserialize, Serialize};

/// How decoded PCM reaches the device voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Decode incrementally on the voice's buffer-needed notification.
    Streaming,
    /// Decode the whole track during load and submit it as one buffer.
    FullDecode,
}

impl Default for FeedMode {
    fn default() -> Self {
        Self::Streaming
    }
}

/// Playback configuration.
///
/// Controls the feeding strategy, queue depth and instance defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Feeding strategy.
    ///
    /// Default: [`FeedMode::Streaming`].
    #[serde(default)]
    pub feed_mode: FeedMode,

    /// Number of buffers the streaming feeder keeps queued on the voice.
    ///
    /// Default: 3.
    #[serde(default = "default_target_buffer_count")]
    pub target_buffer_count: usize,

    /// Samples (not frames) decoded per submitted buffer.
    ///
    /// Bounds the work done per buffer-needed callback.
    ///
    /// Default: 44100 (~1s of mono or ~0.5s of stereo at 44.1kHz).
    #[serde(default = "default_samples_per_buffer")]
    pub samples_per_buffer: usize,

    /// Volume given to new instances, `0..=100`.
    ///
    /// Default: 100.
    #[serde(default = "default_volume")]
    pub default_volume: u32,

    /// Loop flag given to new instances.
    ///
    /// Default: false. Streaming voices loop at the feeder regardless.
    #[serde(default)]
    pub default_looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            feed_mode: FeedMode::default(),
            target_buffer_count: default_target_buffer_count(),
            samples_per_buffer: default_samples_per_buffer(),
            default_volume: default_volume(),
            default_looping: false,
        }
    }
}

impl PlaybackConfig {
    /// Configuration that decodes whole tracks up front.
    pub fn full_decode() -> Self {
        Self {
            feed_mode: FeedMode::FullDecode,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_buffer_count == 0 {
            return Err("target_buffer_count must be > 0".to_string());
        }

        if self.samples_per_buffer < 2 {
            return Err("samples_per_buffer must hold at least one stereo frame".to_string());
        }

        if self.default_volume > bridge_traits::MAX_VOLUME {
            return Err(format!(
                "default_volume must be between 0 and {}",
                bridge_traits::MAX_VOLUME
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_target_buffer_count() -> usize {
    3
}

fn default_samples_per_buffer() -> usize {
    44_100
}

fn default_volume() -> u32 {
    bridge_traits::MAX_VOLUME
}
