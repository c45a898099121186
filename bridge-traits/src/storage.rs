//! Settings storage abstraction.
//!
//! The playback core only needs to read the user's global music volume, and it
//! reads it from non-blocking control paths (`set_volume`, load completion).
//! Implementations must therefore answer from memory; any persistence happens
//! out of band.

/// Volume scale shared by the settings store and playback instances.
pub const MAX_VOLUME: u32 = 100;

/// Read access to the user's audio preferences.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::AudioSettings;
///
/// fn is_muted(settings: &dyn AudioSettings) -> bool {
///     settings.music_volume() == 0
/// }
/// ```
pub trait AudioSettings: Send + Sync {
    /// Global music volume on a `0..=100` scale.
    fn music_volume(&self) -> u32;
}

/// Fixed settings, handy for tools and tests that have no preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAudioSettings {
    pub music_volume: u32,
}

impl Default for StaticAudioSettings {
    fn default() -> Self {
        Self {
            music_volume: MAX_VOLUME,
        }
    }
}

impl AudioSettings for StaticAudioSettings {
    fn music_volume(&self) -> u32 {
        self.music_volume
    }
}
