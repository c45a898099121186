//! # Music Player
//!
//! Entry point the game holds: resolves asset paths, caches one
//! [`MusicSource`] per file and owns the [`MusicRegistry`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{MusicPlayer, PlaybackConfig};
//! use core_runtime::config::CoreConfig;
//!
//! let core = CoreConfig::builder().content_root("resources").build()?;
//! let player = MusicPlayer::new(core, PlaybackConfig::default())?;
//!
//! let theme = player.play("music/theme.ogg");
//! theme.set_volume(70);
//! ```

use crate::config::PlaybackConfig;
use crate::context::PlaybackContext;
use crate::decoder::DecoderFactory;
use crate::error::{PlaybackError, Result};
use crate::instance::MusicInstance;
use crate::registry::MusicRegistry;
use crate::source::MusicSource;
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct MusicPlayer {
    core: CoreConfig,
    ctx: PlaybackContext,
    registry: Arc<MusicRegistry>,
    sources: Mutex<HashMap<PathBuf, Arc<MusicSource>>>,
}

impl MusicPlayer {
    /// Create a player decoding with symphonia.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Runtime`] if the core wiring is invalid,
    /// [`PlaybackError::Config`] if `config` fails validation.
    pub fn new(core: CoreConfig, config: PlaybackConfig) -> Result<Self> {
        core.validate()?;
        config.validate().map_err(PlaybackError::Config)?;

        let ctx = PlaybackContext::from_core(&core, config);
        info!(
            content_root = %core.content_root.display(),
            mode = ?ctx.config.feed_mode,
            "Music player ready"
        );

        Ok(Self {
            core,
            ctx,
            registry: MusicRegistry::new(),
            sources: Mutex::new(HashMap::new()),
        })
    }

    /// Swap the decoding backend used for sources opened from now on.
    pub fn with_decoders(mut self, decoders: Arc<dyn DecoderFactory>) -> Self {
        self.ctx = self.ctx.with_decoders(decoders);
        self
    }

    pub fn context(&self) -> &PlaybackContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<MusicRegistry> {
        &self.registry
    }

    /// Source for `path`, relative to the content root unless absolute.
    ///
    /// The same path always yields the same source. An empty path gives a
    /// source whose instances stay silent.
    pub fn open_source(&self, path: impl AsRef<Path>) -> Arc<MusicSource> {
        let path = path.as_ref();
        let resolved = if path.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            self.core.resolve_asset(path)
        };

        self.sources
            .lock()
            .entry(resolved)
            .or_insert_with_key(|resolved| {
                debug!(path = %resolved.display(), "Opened music source");
                MusicSource::new(resolved.clone())
            })
            .clone()
    }

    /// Start `path` as the active music and request playback.
    pub fn play(&self, path: impl AsRef<Path>) -> Arc<MusicInstance> {
        let instance = self
            .open_source(path)
            .create_instance(&self.ctx, &self.registry);
        instance.play();
        instance
    }

    pub fn active(&self) -> Option<Arc<MusicInstance>> {
        self.registry.active()
    }

    pub fn stop_active(&self) {
        if let Some(instance) = self.registry.active() {
            instance.stop();
        }
    }

    /// Re-read the global music volume into the active instance.
    pub fn refresh_volume(&self) {
        if let Some(instance) = self.registry.active() {
            instance.refresh_volume();
        }
    }

    /// Dispose the active music and release every cached source.
    pub fn shutdown(&self) {
        if let Some(instance) = self.registry.active() {
            instance.dispose();
        }
        for source in self.sources.lock().drain().map(|(_, source)| source) {
            source.close();
        }
        info!("Music player shut down");
    }
}

impl std::fmt::Debug for MusicPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicPlayer")
            .field("content_root", &self.core.content_root)
            .field("config", &self.ctx.config)
            .field("registry", &self.registry)
            .finish()
    }
}
