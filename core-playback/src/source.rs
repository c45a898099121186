//! # Music Source
//!
//! A [`MusicSource`] names one music asset. It owns the decoder for that file
//! (opened lazily by the first instance load, released when the owning
//! instance disposes) and the device voice most recently created for it.

use crate::context::PlaybackContext;
use crate::decoder::SampleDecoder;
use crate::error::{PlaybackError, Result};
use crate::feeder::{decoder_slot, DecoderSlot};
use crate::instance::MusicInstance;
use crate::registry::MusicRegistry;
use bridge_traits::{DeviceVoice, PcmFormat};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Voice and decoder produced by [`MusicSource::load`].
pub(crate) struct LoadedSong {
    pub voice: Arc<dyn DeviceVoice>,
    pub decoder: DecoderSlot,
    pub format: PcmFormat,
}

/// A music asset on disk.
pub struct MusicSource {
    path: PathBuf,
    name: String,
    decoder: Mutex<DecoderSlot>,
    voice: Mutex<Option<Arc<dyn DeviceVoice>>>,
    load_lock: Mutex<()>,
}

impl MusicSource {
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        let path = path.into();
        let name = strip_path(&path);
        Arc::new(Self {
            path,
            name,
            decoder: Mutex::new(Arc::new(Mutex::new(None))),
            voice: Mutex::new(None),
            load_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in logs and user notices.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a decoder is currently open.
    pub fn is_open(&self) -> bool {
        self.decoder.lock().lock().is_some()
    }

    /// Start a new instance of this source.
    ///
    /// The instance becomes the registry's active music, stopping and
    /// disposing whatever played before, and begins loading in the
    /// background.
    pub fn create_instance(
        self: &Arc<Self>,
        ctx: &PlaybackContext,
        registry: &Arc<MusicRegistry>,
    ) -> Arc<MusicInstance> {
        MusicInstance::new(self.clone(), ctx.clone(), registry)
    }

    /// Open (or reuse) the decoder and create a fresh device voice for it.
    ///
    /// Any voice previously created for this source is disposed first.
    /// Returns `Ok(None)` without touching the source if `cancel` fired
    /// before the load could start.
    #[instrument(skip_all, fields(track = %self.name))]
    pub(crate) fn load(
        &self,
        ctx: &PlaybackContext,
        cancel: &CancellationToken,
    ) -> Result<Option<LoadedSong>> {
        let _serial = self.load_lock.lock();
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if self.path.as_os_str().is_empty() {
            return Err(PlaybackError::EmptySourcePath);
        }

        let decoder = self.take_or_open(ctx)?;
        let format = decoder.format();

        if let Some(previous) = self.voice.lock().take() {
            debug!("Disposing previous voice");
            previous.dispose();
        }

        let voice = ctx.device.create_voice(format)?;
        let slot = decoder_slot(decoder);
        *self.decoder.lock() = slot.clone();
        *self.voice.lock() = Some(voice.clone());

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels.channel_count(),
            "Created voice"
        );

        Ok(Some(LoadedSong {
            voice,
            decoder: slot,
            format,
        }))
    }

    /// Release the decoder and any voice still held for this source.
    pub fn close(&self) {
        let decoder = self.decoder.lock().lock().take();
        if decoder.is_some() {
            debug!(track = %self.name, "Closed decoder");
        }
        if let Some(voice) = self.voice.lock().take() {
            voice.dispose();
        }
    }

    fn take_or_open(&self, ctx: &PlaybackContext) -> Result<Box<dyn SampleDecoder>> {
        let reused = self.decoder.lock().lock().take();
        if let Some(mut decoder) = reused {
            match decoder.seek_to_start() {
                Ok(()) => return Ok(decoder),
                Err(e) => warn!(error = %e, "Could not rewind open decoder, reopening"),
            }
        }
        ctx.decoders.open(&self.path)
    }
}

impl std::fmt::Debug for MusicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicSource")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
