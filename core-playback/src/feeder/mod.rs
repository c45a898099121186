//! # PCM Feeders
//!
//! Feeders move decoded audio onto a device voice. Two strategies share the
//! [`PlaybackFeeder`] interface:
//!
//! - [`StreamingFeeder`]: decodes a bounded chunk per buffer-needed
//!   notification and keeps the voice queue at a target depth, looping by
//!   rewinding the decoder at end of stream.
//! - [`FullDecodeFeeder`]: decodes the whole track once, submits it as a
//!   single buffer and lets the device loop it.
//!
//! Both convert with [`SampleConverter`](crate::decoder::SampleConverter), so
//! clamping is identical whichever path is configured.
//!
//! ## Failure reporting
//!
//! Feeders run on the device's callback context and cannot return errors to
//! anyone. A failing feeder releases its decoder and records the reason in
//! the shared [`FeedStatus`]; the owning instance picks it up on its next
//! control call.

mod full_decode;
mod streaming;

pub use full_decode::FullDecodeFeeder;
pub use streaming::{FillOutcome, StreamingFeeder};

use crate::config::{FeedMode, PlaybackConfig};
use crate::decoder::SampleDecoder;
use crate::error::Result;
use bridge_traits::DeviceVoice;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Decoder shared between a source and the feeder reading from it.
///
/// `None` means the decoder has been released; readers must stop.
pub type DecoderSlot = Arc<Mutex<Option<Box<dyn SampleDecoder>>>>;

/// Wrap a decoder in a fresh [`DecoderSlot`].
pub fn decoder_slot(decoder: Box<dyn SampleDecoder>) -> DecoderSlot {
    Arc::new(Mutex::new(Some(decoder)))
}

/// Snapshot of feeder bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Buffers handed to the voice.
    pub buffers_submitted: u64,
    /// End-of-stream rewinds performed.
    pub rewinds: u64,
}

/// Counters and failure slot shared between a feeder and its instance.
#[derive(Debug, Default)]
pub struct FeedStatus {
    buffers_submitted: AtomicU64,
    rewinds: AtomicU64,
    failure: Mutex<Option<String>>,
}

impl FeedStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            buffers_submitted: self.buffers_submitted.load(Ordering::Relaxed),
            rewinds: self.rewinds.load(Ordering::Relaxed),
        }
    }

    /// Record a fatal feeding error. The first reason wins.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(reason.into());
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failure.lock().is_some()
    }

    /// Take the recorded failure, leaving the slot empty.
    pub fn take_failure(&self) -> Option<String> {
        self.failure.lock().take()
    }

    pub(crate) fn record_submission(&self) {
        self.buffers_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rewind(&self) {
        self.rewinds.fetch_add(1, Ordering::Relaxed);
    }
}

/// Strategy that supplies PCM to one device voice.
pub trait PlaybackFeeder: Send {
    /// Wire the feeder to `voice` and perform first-buffer preparation.
    ///
    /// Runs on the load task while the instance's voice slot is locked.
    /// An error means the voice must not be used.
    fn install(self: Box<Self>, voice: &Arc<dyn DeviceVoice>) -> Result<()>;

    /// Whether looping is delegated to the device's loop flag.
    fn loops_on_device(&self) -> bool;
}

/// Build the feeder selected by `config.feed_mode`.
pub fn build_feeder(
    config: &PlaybackConfig,
    decoder: DecoderSlot,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
    label: impl Into<String>,
) -> Box<dyn PlaybackFeeder> {
    match config.feed_mode {
        FeedMode::Streaming => Box::new(StreamingFeeder::new(
            decoder,
            status,
            cancel,
            config.target_buffer_count,
            config.samples_per_buffer,
            label,
        )),
        FeedMode::FullDecode => Box::new(FullDecodeFeeder::new(
            decoder,
            status,
            cancel,
            config.samples_per_buffer,
            label,
        )),
    }
}
