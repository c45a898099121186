//! Settings Storage using a JSON file

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{AudioSettings, MAX_VOLUME},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Audio preferences as persisted on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioPreferences {
    pub music_volume: u32,
}

impl Default for AudioPreferences {
    fn default() -> Self {
        Self {
            music_volume: MAX_VOLUME,
        }
    }
}

impl AudioPreferences {
    fn clamped(self) -> Self {
        Self {
            music_volume: self.music_volume.min(MAX_VOLUME),
        }
    }
}

/// JSON-file backed settings store
///
/// Keeps the preferences cached in memory so reads never touch the disk:
/// - Missing file means defaults (full volume)
/// - Every setter rewrites the file
/// - Out-of-range volumes are clamped to `0..=100`
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    cache: RwLock<AudioPreferences>,
}

impl JsonSettingsStore {
    /// Load settings from `path`, or start from defaults if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let preferences = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let parsed: AudioPreferences = serde_json::from_str(&text).map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to parse settings file: {}", e))
            })?;
            parsed.clamped()
        } else {
            debug!(path = ?path, "Settings file missing, using defaults");
            AudioPreferences::default()
        };

        debug!(path = ?path, ?preferences, "Initialized settings store");

        Ok(Self {
            path: Some(path),
            cache: RwLock::new(preferences),
        })
    }

    /// Create an in-memory settings store (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: RwLock::new(AudioPreferences::default()),
        }
    }

    /// Snapshot of the cached preferences.
    pub fn preferences(&self) -> AudioPreferences {
        *self.cache.read()
    }

    /// File backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set the global music volume and persist it.
    pub fn set_music_volume(&self, volume: u32) -> Result<()> {
        self.update(|prefs| prefs.music_volume = volume)
    }

    fn update(&self, apply: impl FnOnce(&mut AudioPreferences)) -> Result<()> {
        let snapshot = {
            let mut cache = self.cache.write();
            apply(&mut cache);
            *cache = cache.clamped();
            *cache
        };
        self.persist(&snapshot)
    }

    fn persist(&self, preferences: &AudioPreferences) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let text = serde_json::to_string_pretty(preferences).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(path, text).map_err(|e| {
            warn!(path = ?path, error = %e, "Failed to write settings file");
            BridgeError::Io(e)
        })?;

        debug!(path = ?path, "Stored settings");
        Ok(())
    }
}

impl AudioSettings for JsonSettingsStore {
    fn music_volume(&self) -> u32 {
        self.cache.read().music_volume
    }
}
