//! # Core Configuration Module
//!
//! Provides configuration management for the game music core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every host capability the playback core needs. It
//! enforces fail-fast validation so a missing bridge is reported at startup
//! rather than the first time a track is loaded.
//!
//! ## Required Dependencies
//!
//! - `content_root` - Directory that relative music paths resolve against
//! - `AudioDevice` - Creates device voices (desktop default: cpal)
//! - `AudioSettings` - Global music volume (desktop default: JSON file)
//! - `NotificationSink` - User-visible load failures (desktop default: tracing)
//! - Tokio runtime handle - Runs background loads (default: the current runtime)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! the three bridges are injected automatically if not provided.
//!
//! ## Usage
//!
//! ### Basic Configuration with Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .content_root("/path/to/client/resources")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Configuration with Custom Bridges
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .content_root("resources")
//!     .audio_device(Arc::new(MyMixer))
//!     .audio_settings(Arc::new(MyOptions))
//!     .notification_sink(Arc::new(MyChatbox))
//!     .runtime_handle(runtime.handle().clone())
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No content root: fails before any bridge is created
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing content root");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AudioDevice, AudioSettings, NotificationSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Core configuration for the game music core.
///
/// This struct holds all dependencies and settings required to initialize
/// the playback core. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory that relative music paths are resolved against
    pub content_root: PathBuf,

    /// Platform mixer used to create device voices
    pub audio_device: Arc<dyn AudioDevice>,

    /// Global audio preferences (music volume)
    pub audio_settings: Arc<dyn AudioSettings>,

    /// Receives user-visible notices such as load failures
    pub notification_sink: Arc<dyn NotificationSink>,

    /// Runtime that background loads are spawned on
    pub runtime_handle: Handle,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("content_root", &self.content_root)
            .field("audio_device", &"AudioDevice { ... }")
            .field("audio_settings", &"AudioSettings { ... }")
            .field("notification_sink", &"NotificationSink { ... }")
            .field("runtime_handle", &self.runtime_handle)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Content root is not empty
    /// - The audio device reports a usable volume range
    pub fn validate(&self) -> Result<()> {
        if self.content_root.as_os_str().is_empty() {
            return Err(Error::Config("Content root cannot be empty".to_string()));
        }

        let range = self.audio_device.volume_range();
        if !(range.start().is_finite() && range.end().is_finite()) || range.start() > range.end()
        {
            return Err(Error::Config(format!(
                "AudioDevice reported an invalid volume range {:?}",
                range
            )));
        }

        Ok(())
    }

    /// Resolve an asset path against the content root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_asset(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.content_root.join(path)
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn audio_device_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioDevice".to_string(),
        message: "AudioDevice implementation is required for music output. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default CpalAudioDevice. \
                 Engine-embedded: inject an adapter over the engine's sound mixer."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn audio_settings_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioSettings".to_string(),
        message: "AudioSettings implementation is required for the global music volume. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default JsonSettingsStore. \
                 Engine-embedded: inject an adapter over the game's options database."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn notification_sink_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "NotificationSink".to_string(),
        message: "NotificationSink implementation is required to report load failures. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TracingNotificationSink. \
                 Engine-embedded: inject an adapter over the chat box or toast system."
            .to_string(),
    }
}

fn runtime_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "TaskRuntime".to_string(),
        message: "A Tokio runtime is required to load music in the background. \
                 Call .runtime_handle() or build the config from inside a runtime."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_device() -> Result<Arc<dyn AudioDevice>> {
    use bridge_desktop::CpalAudioDevice;

    let device = CpalAudioDevice::default_output().map_err(|e| Error::CapabilityMissing {
        capability: "AudioDevice".to_string(),
        message: format!("No default output device is available: {}", e),
    })?;

    let device: Arc<dyn AudioDevice> = Arc::new(device);
    Ok(device)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_device() -> Result<Arc<dyn AudioDevice>> {
    Err(audio_device_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_settings(content_root: &Path) -> Result<Arc<dyn AudioSettings>> {
    use bridge_desktop::JsonSettingsStore;

    let store = JsonSettingsStore::open(content_root.join("settings.json")).map_err(|e| {
        Error::Internal(format!("Failed to initialize default AudioSettings: {}", e))
    })?;

    let store: Arc<dyn AudioSettings> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_settings(_content_root: &Path) -> Result<Arc<dyn AudioSettings>> {
    Err(audio_settings_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    use bridge_desktop::TracingNotificationSink;

    let sink: Arc<dyn NotificationSink> = Arc::new(TracingNotificationSink);
    Ok(sink)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    Err(notification_sink_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    content_root: Option<PathBuf>,
    audio_device: Option<Arc<dyn AudioDevice>>,
    audio_settings: Option<Arc<dyn AudioSettings>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    runtime_handle: Option<Handle>,
}

impl CoreConfigBuilder {
    /// Sets the content root.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .content_root("resources");
    /// ```
    pub fn content_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.content_root = Some(path.into());
        self
    }

    /// Sets the audio device implementation.
    ///
    /// If not provided, the desktop default (cpal-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn audio_device(mut self, device: Arc<dyn AudioDevice>) -> Self {
        self.audio_device = Some(device);
        self
    }

    /// Sets the audio settings implementation.
    ///
    /// If not provided, the desktop default reads `settings.json` under the
    /// content root when the `desktop-shims` feature is enabled.
    pub fn audio_settings(mut self, settings: Arc<dyn AudioSettings>) -> Self {
        self.audio_settings = Some(settings);
        self
    }

    /// Sets the notification sink implementation.
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    /// Sets the runtime that background loads run on.
    ///
    /// Default: the runtime `build()` is called from.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime_handle = Some(handle);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The content root is missing
    /// - A required bridge is missing and has no desktop default
    /// - No runtime handle was given and none is current
    pub fn build(self) -> Result<CoreConfig> {
        let content_root = self.content_root.ok_or_else(|| {
            Error::Config("Content root is required. Use .content_root() to set it.".to_string())
        })?;

        let runtime_handle = match self.runtime_handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| runtime_missing_error())?,
        };

        let audio_device = match self.audio_device {
            Some(device) => device,
            None => provide_default_audio_device()?,
        };

        let audio_settings = match self.audio_settings {
            Some(settings) => settings,
            None => provide_default_audio_settings(&content_root)?,
        };

        let notification_sink = match self.notification_sink {
            Some(sink) => sink,
            None => provide_default_notification_sink()?,
        };

        let config = CoreConfig {
            content_root,
            audio_device,
            audio_settings,
            notification_sink,
            runtime_handle,
        };

        config.validate()?;

        Ok(config)
    }
}
