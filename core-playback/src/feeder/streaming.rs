//! Callback-driven streaming feeder.

use super::{DecoderSlot, FeedStatus, PlaybackFeeder};
use crate::decoder::SampleConverter;
use crate::error::{PlaybackError, Result};
use bridge_traits::{BridgeError, DeviceVoice};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Result of one [`StreamingFeeder::fill_buffers`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The voice holds the target number of buffers.
    Full,
    /// The decoder was released (closed, failed, or held no audio).
    DecoderClosed,
    /// The owning instance was disposed; nothing was submitted.
    Cancelled,
    /// The voice rejected a buffer; feeding stopped.
    VoiceRejected,
}

/// Keeps a device voice's queue topped up from a streaming decoder.
///
/// Scratch and output buffers are allocated once and reused for every
/// callback.
pub struct StreamingFeeder {
    decoder: DecoderSlot,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
    target_buffers: usize,
    scratch: Vec<f32>,
    pcm: Vec<u8>,
    label: String,
}

impl StreamingFeeder {
    pub fn new(
        decoder: DecoderSlot,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
        target_buffers: usize,
        samples_per_buffer: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            status,
            cancel,
            target_buffers: target_buffers.max(1),
            scratch: vec![0.0; samples_per_buffer.max(2)],
            pcm: Vec::with_capacity(samples_per_buffer.max(2) * 2),
            label: label.into(),
        }
    }

    /// Handle one buffer-needed notification.
    ///
    /// Decodes and submits until the voice holds `target_buffers` buffers or
    /// the decoder is gone. End of stream rewinds to the start; a zero read
    /// straight after a rewind means the stream has no audio at all, and the
    /// decoder is released instead of spinning.
    pub fn fill_buffers(&mut self, voice: &dyn DeviceVoice) -> FillOutcome {
        let mut just_rewound = false;

        while voice.pending_buffer_count() < self.target_buffers {
            if self.cancel.is_cancelled() {
                return FillOutcome::Cancelled;
            }

            let mut slot = self.decoder.lock();
            let Some(decoder) = slot.as_mut() else {
                return FillOutcome::DecoderClosed;
            };

            let read = match decoder.read_samples(&mut self.scratch) {
                Ok(read) => read,
                Err(e) => {
                    *slot = None;
                    drop(slot);
                    error!(track = %self.label, error = %e, "Decoder read failed; stopping feed");
                    self.status.fail(e.to_string());
                    return FillOutcome::DecoderClosed;
                }
            };

            if read == 0 {
                if just_rewound {
                    *slot = None;
                    warn!(track = %self.label, "Stream holds no audio; releasing decoder");
                    return FillOutcome::DecoderClosed;
                }

                if let Err(e) = decoder.seek_to_start() {
                    *slot = None;
                    drop(slot);
                    error!(track = %self.label, error = %e, "Rewind failed; stopping feed");
                    self.status.fail(e.to_string());
                    return FillOutcome::DecoderClosed;
                }

                self.status.record_rewind();
                debug!(track = %self.label, "End of stream, looping");
                just_rewound = true;
                continue;
            }
            drop(slot);
            just_rewound = false;

            SampleConverter::write_pcm16_le(&self.scratch[..read], &mut self.pcm);

            if self.cancel.is_cancelled() {
                return FillOutcome::Cancelled;
            }

            match voice.submit_buffer(&self.pcm) {
                Ok(()) => self.status.record_submission(),
                Err(BridgeError::VoiceDisposed) => {
                    debug!(track = %self.label, "Voice disposed; stopping feed");
                    return FillOutcome::VoiceRejected;
                }
                Err(e) => {
                    error!(track = %self.label, error = %e, "Voice rejected buffer");
                    self.status.fail(e.to_string());
                    return FillOutcome::VoiceRejected;
                }
            }
        }

        FillOutcome::Full
    }
}

impl PlaybackFeeder for StreamingFeeder {
    fn install(mut self: Box<Self>, voice: &Arc<dyn DeviceVoice>) -> Result<()> {
        // First-buffer preparation, so playback can start without waiting
        // for the device's first notification.
        let outcome = self.fill_buffers(voice.as_ref());
        if let Some(reason) = self.status.take_failure() {
            return Err(PlaybackError::Decode(reason));
        }
        debug!(track = %self.label, ?outcome, "Primed streaming voice");

        let mut feeder = *self;
        voice.set_buffer_needed(Box::new(move |voice: &dyn DeviceVoice| {
            feeder.fill_buffers(voice);
        }));
        Ok(())
    }

    fn loops_on_device(&self) -> bool {
        false
    }
}
