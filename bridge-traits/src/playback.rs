//! Audio device bridge traits and supporting PCM types.
//!
//! These abstractions let the core playback module drive a platform sound
//! mixer without knowing which one it is. A host hands the core an
//! [`AudioDevice`]; the core asks it for one [`DeviceVoice`] per playing
//! track and keeps that voice's buffer queue topped up with 16-bit PCM.
//!
//! ## Buffer-needed notifications
//!
//! Voices are push-fed. The device raises an edge-triggered "buffer needed"
//! notification (see [`DeviceVoice::set_buffer_needed`]) whenever its queue
//! drains below what it wants. The handler runs on a device-managed context,
//! so it must finish quickly and must never call back into the voice's
//! lifecycle methods (`dispose`, `set_buffer_needed`).

use crate::error::Result;
use std::ops::RangeInclusive;

/// Channel layout accepted by device voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Map a decoder channel count onto a voice layout.
    ///
    /// Returns `None` for anything other than one or two channels.
    pub fn from_channel_count(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => None,
        }
    }

    /// Number of interleaved channels.
    pub fn channel_count(&self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// PCM format of the buffers submitted to a voice.
///
/// Voices always consume interleaved signed 16-bit little-endian samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Channel layout.
    pub channels: ChannelLayout,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: ChannelLayout) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes occupied by one interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels.channel_count() as usize * std::mem::size_of::<i16>()
    }
}

/// Playback state reported by a device voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Playing,
    Paused,
    Stopped,
}

/// Handler invoked when a voice wants more PCM.
///
/// The handler receives the voice itself so it can query the pending count
/// and submit buffers without holding a separate reference.
pub type BufferNeededHandler = Box<dyn FnMut(&dyn DeviceVoice) + Send>;

/// A live, audible playback channel owned by the platform mixer.
pub trait DeviceVoice: Send + Sync {
    /// Queue one buffer of interleaved 16-bit little-endian PCM.
    ///
    /// The voice copies the bytes; callers may reuse `pcm` immediately.
    fn submit_buffer(&self, pcm: &[u8]) -> Result<()>;

    /// Number of submitted buffers not yet fully played.
    fn pending_buffer_count(&self) -> usize;

    /// Start or resume playback.
    fn play(&self) -> Result<()>;

    /// Pause without dropping queued buffers.
    fn pause(&self) -> Result<()>;

    /// Stop playback.
    fn stop(&self) -> Result<()>;

    /// Current device-side state.
    fn state(&self) -> Result<VoiceState>;

    /// Set the output gain in device-native units (see
    /// [`AudioDevice::volume_range`]).
    fn set_volume(&self, volume: f32) -> Result<()>;

    /// Ask the device to replay its queued buffer when it finishes.
    ///
    /// Only meaningful for voices fed with a single complete buffer.
    fn set_looped(&self, looped: bool) -> Result<()>;

    /// Install the buffer-needed handler, replacing any previous one.
    fn set_buffer_needed(&self, handler: BufferNeededHandler);

    /// Whether [`DeviceVoice::dispose`] has run.
    fn is_disposed(&self) -> bool;

    /// Release the device resources. Idempotent.
    fn dispose(&self);
}

/// Factory for device voices; one per platform mixer.
pub trait AudioDevice: Send + Sync {
    /// Create a stopped voice accepting buffers in `format`.
    fn create_voice(&self, format: PcmFormat) -> Result<std::sync::Arc<dyn DeviceVoice>>;

    /// Range of values accepted by [`DeviceVoice::set_volume`].
    fn volume_range(&self) -> RangeInclusive<f32> {
        0.0..=1.0
    }
}
