//! Whole-track feeder.

use super::{DecoderSlot, FeedStatus, PlaybackFeeder};
use crate::decoder::SampleConverter;
use crate::error::{PlaybackError, Result};
use bridge_traits::DeviceVoice;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decodes the entire stream during load and submits it as one buffer.
///
/// Looping is left to the device (`set_looped`), so no callback is
/// installed.
pub struct FullDecodeFeeder {
    decoder: DecoderSlot,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
    chunk_samples: usize,
    label: String,
}

impl FullDecodeFeeder {
    pub fn new(
        decoder: DecoderSlot,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
        chunk_samples: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            status,
            cancel,
            chunk_samples: chunk_samples.max(2),
            label: label.into(),
        }
    }

    /// Decode everything into 16-bit little-endian PCM.
    ///
    /// Returns `Ok(None)` if cancelled midway. A read error releases the
    /// decoder.
    pub fn decode_all(&self) -> Result<Option<Vec<u8>>> {
        let mut slot = self.decoder.lock();
        let Some(decoder) = slot.as_mut() else {
            return Err(PlaybackError::Decode("decoder already closed".to_string()));
        };

        let mut scratch = vec![0.0f32; self.chunk_samples];
        let mut chunk = Vec::with_capacity(self.chunk_samples * 2);
        let mut pcm = Vec::new();
        let mut clipped = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }

            let read = match decoder.read_samples(&mut scratch) {
                Ok(read) => read,
                Err(e) => {
                    *slot = None;
                    self.status.fail(e.to_string());
                    return Err(e);
                }
            };
            if read == 0 {
                break;
            }

            clipped += SampleConverter::clipped_count(&scratch[..read]);
            SampleConverter::write_pcm16_le(&scratch[..read], &mut chunk);
            pcm.extend_from_slice(&chunk);
        }

        if clipped > 0 {
            debug!(track = %self.label, clipped, "Clamped out-of-range samples");
        }

        Ok(Some(pcm))
    }
}

impl PlaybackFeeder for FullDecodeFeeder {
    fn install(self: Box<Self>, voice: &Arc<dyn DeviceVoice>) -> Result<()> {
        let Some(pcm) = self.decode_all()? else {
            debug!(track = %self.label, "Full decode cancelled");
            return Ok(());
        };

        if pcm.is_empty() {
            warn!(track = %self.label, "Stream holds no audio");
            return Ok(());
        }

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        voice.submit_buffer(&pcm)?;
        self.status.record_submission();
        info!(track = %self.label, bytes = pcm.len(), "Submitted fully decoded track");
        Ok(())
    }

    fn loops_on_device(&self) -> bool {
        true
    }
}
