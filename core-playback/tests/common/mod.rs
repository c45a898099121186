//! Shared fakes for the playback integration tests.

#![allow(dead_code)]

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioDevice, AudioSettings, BridgeError, BufferNeededHandler, ChannelLayout, DeviceVoice,
    NotificationSink, PcmFormat, VoiceState,
};
use core_playback::{
    DecoderFactory, PlaybackConfig, PlaybackContext, PlaybackError, Result, SampleDecoder,
};
use parking_lot::{Condvar, Mutex};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Device voice
// ============================================================================

/// Voice that records everything and never drains on its own.
pub struct FakeVoice {
    pub format: PcmFormat,
    submitted: Mutex<Vec<Vec<u8>>>,
    pending: AtomicUsize,
    state: Mutex<VoiceState>,
    volume: Mutex<Option<f32>>,
    looped: Mutex<Option<bool>>,
    commands: Mutex<Vec<&'static str>>,
    handler: Mutex<Option<BufferNeededHandler>>,
    disposed: AtomicBool,
    reject_submit: AtomicBool,
}

impl FakeVoice {
    pub fn new(format: PcmFormat) -> Arc<Self> {
        Arc::new(Self {
            format,
            submitted: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            state: Mutex::new(VoiceState::Stopped),
            volume: Mutex::new(None),
            looped: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            disposed: AtomicBool::new(false),
            reject_submit: AtomicBool::new(false),
        })
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Pretend the device finished playing `buffers` buffers.
    pub fn consume(&self, buffers: usize) {
        let pending = self.pending.load(Ordering::SeqCst);
        self.pending
            .store(pending.saturating_sub(buffers), Ordering::SeqCst);
    }

    /// Raise buffer-needed the way a device would.
    pub fn fire_buffer_needed(self: &Arc<Self>) {
        let handler = self.handler.lock().take();
        if let Some(mut handler) = handler {
            let voice: &dyn DeviceVoice = &**self;
            handler(voice);
            let mut slot = self.handler.lock();
            if slot.is_none() && !self.is_disposed() {
                *slot = Some(handler);
            }
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock()
    }

    pub fn looped(&self) -> Option<bool> {
        *self.looped.lock()
    }

    pub fn commands(&self) -> Vec<&'static str> {
        self.commands.lock().clone()
    }

    pub fn reject_submissions(&self) {
        self.reject_submit.store(true, Ordering::SeqCst);
    }

    fn command(&self, name: &'static str, state: VoiceState) -> BridgeResult<()> {
        if self.is_disposed() {
            return Err(BridgeError::VoiceDisposed);
        }
        self.commands.lock().push(name);
        *self.state.lock() = state;
        Ok(())
    }
}

impl DeviceVoice for FakeVoice {
    fn submit_buffer(&self, pcm: &[u8]) -> BridgeResult<()> {
        if self.is_disposed() {
            return Err(BridgeError::VoiceDisposed);
        }
        if self.reject_submit.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("queue full".to_string()));
        }
        self.submitted.lock().push(pcm.to_vec());
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pending_buffer_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn play(&self) -> BridgeResult<()> {
        self.command("play", VoiceState::Playing)
    }

    fn pause(&self) -> BridgeResult<()> {
        self.command("pause", VoiceState::Paused)
    }

    fn stop(&self) -> BridgeResult<()> {
        self.command("stop", VoiceState::Stopped)
    }

    fn state(&self) -> BridgeResult<VoiceState> {
        if self.is_disposed() {
            return Err(BridgeError::VoiceDisposed);
        }
        Ok(*self.state.lock())
    }

    fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        *self.volume.lock() = Some(volume);
        Ok(())
    }

    fn set_looped(&self, looped: bool) -> BridgeResult<()> {
        *self.looped.lock() = Some(looped);
        Ok(())
    }

    fn set_buffer_needed(&self, handler: BufferNeededHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.handler.lock().take();
    }
}

// ============================================================================
// Device
// ============================================================================

pub struct FakeDevice {
    voices: Mutex<Vec<Arc<FakeVoice>>>,
    range: RangeInclusive<f32>,
    failing: AtomicBool,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Self::with_range(0.0..=1.0)
    }

    pub fn with_range(range: RangeInclusive<f32>) -> Arc<Self> {
        Arc::new(Self {
            voices: Mutex::new(Vec::new()),
            range,
            failing: AtomicBool::new(false),
        })
    }

    pub fn voices(&self) -> Vec<Arc<FakeVoice>> {
        self.voices.lock().clone()
    }

    pub fn last_voice(&self) -> Option<Arc<FakeVoice>> {
        self.voices.lock().last().cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AudioDevice for FakeDevice {
    fn create_voice(
        &self,
        format: PcmFormat,
    ) -> BridgeResult<Arc<dyn DeviceVoice>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::DeviceUnavailable("no output".to_string()));
        }
        let voice = FakeVoice::new(format);
        self.voices.lock().push(voice.clone());
        Ok(voice)
    }

    fn volume_range(&self) -> RangeInclusive<f32> {
        self.range.clone()
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder serving a fixed sample script.
pub struct FakeDecoder {
    format: PcmFormat,
    samples: Vec<f32>,
    position: usize,
    fail_at: Option<usize>,
    seeks: Arc<AtomicUsize>,
    hold: Option<(Arc<Gate>, Arc<Gate>)>,
}

impl FakeDecoder {
    pub fn new(format: PcmFormat, samples: Vec<f32>) -> Self {
        Self {
            format,
            samples,
            position: 0,
            fail_at: None,
            seeks: Arc::new(AtomicUsize::new(0)),
            hold: None,
        }
    }

    /// Stereo ramp `0.0, 0.01, 0.02, ...` of `frames` frames.
    pub fn stereo_ramp(frames: usize) -> Self {
        let samples = (0..frames * 2).map(|i| i as f32 / 100.0).collect();
        Self::new(stereo(), samples)
    }

    /// Fail once the read position reaches `sample`.
    pub fn failing_at(mut self, sample: usize) -> Self {
        self.fail_at = Some(sample);
        self
    }

    /// Open `entered` on every read, then block until `release` opens.
    pub fn holding_reads(mut self, entered: Arc<Gate>, release: Arc<Gate>) -> Self {
        self.hold = Some((entered, release));
        self
    }

    pub fn seek_counter(&self) -> Arc<AtomicUsize> {
        self.seeks.clone()
    }
}

impl SampleDecoder for FakeDecoder {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        if let Some((entered, release)) = &self.hold {
            entered.open();
            release.wait();
        }
        if let Some(fail_at) = self.fail_at {
            if self.position >= fail_at {
                return Err(PlaybackError::Decode("scripted failure".to_string()));
            }
        }

        let channels = self.format.channels.channel_count() as usize;
        let wanted = out.len() - out.len() % channels;
        let read = wanted.min(self.samples.len() - self.position);
        out[..read].copy_from_slice(&self.samples[self.position..self.position + read]);
        self.position += read;
        Ok(read)
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.position = 0;
        self.seeks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn stereo() -> PcmFormat {
    PcmFormat::new(44_100, ChannelLayout::Stereo)
}

// ============================================================================
// Decoder factory
// ============================================================================

type MakeDecoder = dyn Fn(&Path) -> Result<FakeDecoder> + Send + Sync;

pub struct FakeDecoderFactory {
    make: Box<MakeDecoder>,
    gate: Option<Arc<Gate>>,
    entered: Arc<Gate>,
    opens: AtomicUsize,
}

impl FakeDecoderFactory {
    pub fn new(make: impl Fn(&Path) -> Result<FakeDecoder> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            make: Box::new(make),
            gate: None,
            entered: Gate::new(),
            opens: AtomicUsize::new(0),
        })
    }

    /// Factory whose opens block until `gate` is opened.
    pub fn gated(
        gate: Arc<Gate>,
        make: impl Fn(&Path) -> Result<FakeDecoder> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            make: Box::new(make),
            gate: Some(gate),
            entered: Gate::new(),
            opens: AtomicUsize::new(0),
        })
    }

    /// Every path decodes to a stereo ramp of `frames` frames.
    pub fn ramp(frames: usize) -> Arc<Self> {
        Self::new(move |_| Ok(FakeDecoder::stereo_ramp(frames)))
    }

    /// Whether a load has reached `open`.
    pub fn entered(&self) -> bool {
        self.entered.is_open()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DecoderFactory for FakeDecoderFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleDecoder>> {
        self.entered.open();
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new((self.make)(path)?))
    }
}

/// One-shot latch used to hold a background load open.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.changed.notify_all();
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.changed.wait(&mut open);
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Context on the current tokio runtime.
pub fn context(
    device: Arc<FakeDevice>,
    settings: Arc<dyn AudioSettings>,
    notifier: Arc<dyn NotificationSink>,
    decoders: Arc<dyn DecoderFactory>,
    config: PlaybackConfig,
) -> PlaybackContext {
    PlaybackContext {
        device,
        settings,
        notifier,
        decoders,
        runtime: tokio::runtime::Handle::current(),
        config,
    }
}

/// Small buffers so tests can reason about individual submissions.
pub fn small_buffers() -> PlaybackConfig {
    PlaybackConfig {
        samples_per_buffer: 8,
        ..PlaybackConfig::default()
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
