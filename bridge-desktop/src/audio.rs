//! Audio output using `cpal`
//!
//! Each [`CpalVoice`] owns one output stream. A voice keeps a queue of
//! submitted 16-bit buffers; the real-time callback drains it without ever
//! waiting on anything but the queue lock, applies volume, maps channels and
//! sample rate onto the device, and fills underruns with silence.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
//! that parks until the voice is disposed. A second thread raises the
//! buffer-needed notification whenever the callback finishes a buffer, so
//! decoding never happens on the real-time thread.

use bridge_traits::{
    error::{BridgeError, Result},
    AudioDevice, BufferNeededHandler, DeviceVoice, PcmFormat, VoiceState,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Audio device backed by the host's default `cpal` output.
#[derive(Debug, Clone, Default)]
pub struct CpalAudioDevice {
    /// Case-insensitive substring of the output device name; `None` = default.
    output_name: Option<String>,
}

impl CpalAudioDevice {
    /// Use the host default output device.
    ///
    /// Fails if the host reports no output device at all.
    pub fn default_output() -> Result<Self> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| BridgeError::DeviceUnavailable("no default output device".into()))?;
        Ok(Self::default())
    }

    /// Use the first output device whose name contains `needle`.
    pub fn with_output(needle: impl Into<String>) -> Self {
        Self {
            output_name: Some(needle.into()),
        }
    }

    fn pick_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(needle) = &self.output_name {
            let needle = needle.to_lowercase();
            let devices = host
                .output_devices()
                .map_err(|e| BridgeError::DeviceUnavailable(e.to_string()))?;
            for device in devices {
                let matches = device
                    .description()
                    .ok()
                    .map(|desc| desc.to_string().to_lowercase().contains(&needle))
                    .unwrap_or(false);
                if matches {
                    return Ok(device);
                }
            }
            return Err(BridgeError::DeviceUnavailable(format!(
                "no output device matched: {}",
                needle
            )));
        }

        host.default_output_device()
            .ok_or_else(|| BridgeError::DeviceUnavailable("no default output device".into()))
    }
}

impl AudioDevice for CpalAudioDevice {
    fn create_voice(&self, format: PcmFormat) -> Result<Arc<dyn DeviceVoice>> {
        let voice = CpalVoice::open(self.clone(), format)?;
        Ok(voice)
    }
}

const STATE_PLAYING: u8 = 0;
const STATE_PAUSED: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// State shared between the voice handle and the real-time callback.
struct VoiceShared {
    format: PcmFormat,
    queue: Mutex<VecDeque<Vec<i16>>>,
    state: AtomicU8,
    volume_bits: AtomicU32,
    looped: AtomicBool,
    disposed: AtomicBool,
    /// Set by `stop`; the callback rewinds its cursor when it sees it.
    reset_cursor: AtomicBool,
}

/// Read position of the callback inside the front buffer, in source frames.
#[derive(Debug, Default)]
struct PlayCursor {
    position: f64,
}

impl VoiceShared {
    fn new(format: PcmFormat) -> Self {
        Self {
            format,
            queue: Mutex::new(VecDeque::new()),
            state: AtomicU8::new(STATE_STOPPED),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            looped: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            reset_cursor: AtomicBool::new(false),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    /// Fill `out` (interleaved, `out_channels` wide) from the queue.
    ///
    /// `step` is source frames per output frame. Returns `true` when at least
    /// one buffer was retired.
    fn render(&self, out: &mut [f32], out_channels: usize, step: f64, cursor: &mut PlayCursor) -> bool {
        if self.reset_cursor.swap(false, Ordering::AcqRel) {
            cursor.position = 0.0;
        }

        if self.disposed.load(Ordering::Acquire)
            || self.state.load(Ordering::Acquire) != STATE_PLAYING
        {
            out.fill(0.0);
            return false;
        }

        let volume = self.volume();
        let src_channels = self.format.channels.channel_count() as usize;
        let frames = out.len() / out_channels;
        let mut retired = false;

        let mut queue = self.queue.lock();
        for frame in 0..frames {
            // Retire finished buffers until the cursor points at a live frame.
            loop {
                let Some(src_frames) = queue.front().map(|b| b.len() / src_channels) else {
                    break;
                };
                if (cursor.position as usize) < src_frames {
                    break;
                }
                cursor.position = 0.0;
                if src_frames > 0 && queue.len() == 1 && self.looped.load(Ordering::Relaxed) {
                    continue;
                }
                queue.pop_front();
                retired = true;
            }

            let Some(buffer) = queue.front() else {
                // Underrun: silence for the rest of this period.
                out[frame * out_channels..].fill(0.0);
                break;
            };

            let base = cursor.position as usize * src_channels;
            let dst = &mut out[frame * out_channels..(frame + 1) * out_channels];
            for (ch, sample) in dst.iter_mut().enumerate() {
                let value = match (src_channels, out_channels) {
                    (2, 1) => 0.5 * (pcm_to_f32(buffer[base]) + pcm_to_f32(buffer[base + 1])),
                    (1, _) => pcm_to_f32(buffer[base]),
                    _ => pcm_to_f32(buffer[base + ch.min(src_channels - 1)]),
                };
                *sample = value * volume;
            }
            cursor.position += step;
        }

        retired
    }
}

#[inline]
fn pcm_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// One `cpal` output stream with a queue of PCM buffers.
pub struct CpalVoice {
    shared: Arc<VoiceShared>,
    handler: Mutex<Option<BufferNeededHandler>>,
    refill_tx: SyncSender<()>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    stream_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalVoice {
    fn open(device: CpalAudioDevice, format: PcmFormat) -> Result<Arc<Self>> {
        let shared = Arc::new(VoiceShared::new(format));
        let (refill_tx, refill_rx) = mpsc::sync_channel::<()>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let stream_shared = Arc::clone(&shared);
        let stream_refill = refill_tx.clone();
        let stream_thread = thread::Builder::new()
            .name("music-voice-stream".into())
            .spawn(move || {
                run_stream(device, stream_shared, stream_refill, ready_tx, shutdown_rx)
            })?;

        ready_rx
            .recv()
            .map_err(|_| BridgeError::DeviceUnavailable("voice stream thread exited".into()))??;

        let voice = Arc::new(Self {
            shared,
            handler: Mutex::new(None),
            refill_tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            stream_thread: Mutex::new(Some(stream_thread)),
        });

        let weak = Arc::downgrade(&voice);
        thread::Builder::new()
            .name("music-voice-refill".into())
            .spawn(move || run_refill(weak, refill_rx))?;

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels.channel_count(),
            "Opened cpal voice"
        );
        Ok(voice)
    }

    fn request_refill(&self) {
        // Full means a refill is already pending.
        let _ = self.refill_tx.try_send(());
    }

    fn ensure_live(&self) -> Result<()> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(BridgeError::VoiceDisposed);
        }
        Ok(())
    }
}

fn run_stream(
    device: CpalAudioDevice,
    shared: Arc<VoiceShared>,
    refill_tx: SyncSender<()>,
    ready_tx: Sender<Result<()>>,
    shutdown_rx: Receiver<()>,
) {
    let stream = match open_stream(&device, shared, refill_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(BridgeError::DeviceUnavailable(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Parked until the voice drops its shutdown sender.
    let _ = shutdown_rx.recv();
    drop(stream);
    debug!("Voice stream closed");
}

fn open_stream(
    device: &CpalAudioDevice,
    shared: Arc<VoiceShared>,
    refill_tx: SyncSender<()>,
) -> Result<cpal::Stream> {
    let device = device.pick_device()?;
    let supported = device
        .default_output_config()
        .map_err(|e| BridgeError::DeviceUnavailable(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, shared, refill_tx),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, shared, refill_tx),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, shared, refill_tx),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, shared, refill_tx),
        other => Err(BridgeError::NotAvailable(format!(
            "unsupported sample format: {other:?}"
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<VoiceShared>,
    refill_tx: SyncSender<()>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let out_channels = (config.channels as usize).max(1);
    let step = shared.format.sample_rate as f64 / config.sample_rate as f64;
    let mut cursor = PlayCursor::default();
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = |err| warn!("voice stream error: {err}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                scratch.resize(data.len(), 0.0);
                if shared.render(&mut scratch, out_channels, step, &mut cursor) {
                    let _ = refill_tx.try_send(());
                }
                for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = <T as cpal::Sample>::from_sample::<f32>(*src);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| BridgeError::DeviceUnavailable(e.to_string()))
}

fn run_refill(voice: Weak<CpalVoice>, signals: Receiver<()>) {
    while signals.recv().is_ok() {
        let Some(voice) = voice.upgrade() else {
            break;
        };
        if voice.is_disposed() {
            break;
        }
        let mut handler = voice.handler.lock();
        if let Some(handler) = handler.as_mut() {
            handler(&*voice);
        }
    }
    debug!("Voice refill thread exiting");
}

impl DeviceVoice for CpalVoice {
    fn submit_buffer(&self, pcm: &[u8]) -> Result<()> {
        self.ensure_live()?;

        if pcm.len() % self.shared.format.bytes_per_frame() != 0 {
            return Err(BridgeError::OperationFailed(format!(
                "buffer of {} bytes is not frame aligned",
                pcm.len()
            )));
        }

        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        self.shared.queue.lock().push_back(samples);
        Ok(())
    }

    fn pending_buffer_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    fn play(&self) -> Result<()> {
        self.ensure_live()?;
        self.shared.state.store(STATE_PLAYING, Ordering::Release);
        self.request_refill();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        self.shared.state.store(STATE_PAUSED, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.ensure_live()?;
        self.shared.state.store(STATE_STOPPED, Ordering::Release);
        self.shared.queue.lock().clear();
        self.shared.reset_cursor.store(true, Ordering::Release);
        Ok(())
    }

    fn state(&self) -> Result<VoiceState> {
        self.ensure_live()?;
        Ok(match self.shared.state.load(Ordering::Acquire) {
            STATE_PLAYING => VoiceState::Playing,
            STATE_PAUSED => VoiceState::Paused,
            _ => VoiceState::Stopped,
        })
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.ensure_live()?;
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.shared
            .volume_bits
            .store(volume.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn set_looped(&self, looped: bool) -> Result<()> {
        self.ensure_live()?;
        self.shared.looped.store(looped, Ordering::Relaxed);
        Ok(())
    }

    fn set_buffer_needed(&self, handler: BufferNeededHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.state.store(STATE_STOPPED, Ordering::Release);
        self.shared.queue.lock().clear();

        // Wake the refill thread so it observes the flag and exits.
        self.request_refill();
        self.shutdown_tx.lock().take();
        if let Some(handle) = self.stream_thread.lock().take() {
            if handle.join().is_err() {
                warn!("Voice stream thread panicked");
            }
        }
        debug!("Disposed cpal voice");
    }
}

impl Drop for CpalVoice {
    fn drop(&mut self) {
        self.dispose();
    }
}
