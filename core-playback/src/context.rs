//! Shared collaborators handed to sources and instances.

use crate::config::PlaybackConfig;
use crate::decoder::{DecoderFactory, SymphoniaDecoderFactory};
use bridge_traits::{AudioDevice, AudioSettings, NotificationSink};
use core_runtime::config::CoreConfig;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Everything an instance needs to load and control playback.
///
/// Cheap to clone; all collaborators are reference counted.
#[derive(Clone)]
pub struct PlaybackContext {
    pub device: Arc<dyn AudioDevice>,
    pub settings: Arc<dyn AudioSettings>,
    pub notifier: Arc<dyn NotificationSink>,
    pub decoders: Arc<dyn DecoderFactory>,
    pub runtime: Handle,
    pub config: PlaybackConfig,
}

impl PlaybackContext {
    /// Build a context from core wiring, decoding with symphonia.
    pub fn from_core(core: &CoreConfig, config: PlaybackConfig) -> Self {
        Self {
            device: core.audio_device.clone(),
            settings: core.audio_settings.clone(),
            notifier: core.notification_sink.clone(),
            decoders: Arc::new(SymphoniaDecoderFactory),
            runtime: core.runtime_handle.clone(),
            config,
        }
    }

    /// Replace the decoder backend.
    pub fn with_decoders(mut self, decoders: Arc<dyn DecoderFactory>) -> Self {
        self.decoders = decoders;
        self
    }
}

impl fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("device", &"AudioDevice")
            .field("settings", &"AudioSettings")
            .field("notifier", &"NotificationSink")
            .field("config", &self.config)
            .finish()
    }
}
