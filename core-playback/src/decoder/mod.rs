//! # Audio Decoder Module
//!
//! Streaming sample decoding behind a small trait seam.
//!
//! ## Overview
//!
//! The feeders only need three things from a decoder: the PCM format of the
//! stream, "give me up to N more samples", and "go back to the beginning".
//! [`SampleDecoder`] captures exactly that; [`DecoderFactory`] opens one for a
//! path so hosts and tests can swap the decoding backend.
//!
//! The default backend is [`SymphoniaDecoder`], opened through
//! [`SymphoniaDecoderFactory`].
//!
//! ## Supported Formats
//!
//! | Format | Codec | Feature Flag |
//! |--------|-------|--------------|
//! | Ogg Vorbis | Vorbis | `decoder-vorbis` |
//! | MP3 | MPEG-1/2 Audio Layer III | `decoder-mp3` |
//! | FLAC | Free Lossless Audio Codec | `decoder-flac` |
//! | WAV | PCM | `decoder-wav` |
//!
//! ## Sample Layout
//!
//! Samples are interleaved `f32`, nominally in `[-1.0, 1.0]`. Reads always
//! return whole frames so a buffer never splits a stereo pair.

mod format_detector;
mod sample_converter;
mod symphonia;

pub use self::symphonia::{SymphoniaDecoder, SymphoniaDecoderFactory};
pub use format_detector::{FormatDetector, MusicCodec};
pub use sample_converter::SampleConverter;

use crate::error::Result;
use bridge_traits::PcmFormat;
use std::path::Path;

/// An open, sequentially readable audio stream.
pub trait SampleDecoder: Send {
    /// PCM format of the decoded samples.
    fn format(&self) -> PcmFormat;

    /// Fill `out` with up to `out.len()` interleaved samples.
    ///
    /// Returns the number of samples written, always a multiple of the
    /// channel count. `Ok(0)` means end of stream; reading past the end keeps
    /// returning `Ok(0)`.
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize>;

    /// Reposition the stream at its first sample.
    fn seek_to_start(&mut self) -> Result<()>;
}

/// Opens decoders for audio files.
pub trait DecoderFactory: Send + Sync {
    /// Open `path` for decoding.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::DecodeOpen`](crate::PlaybackError::DecodeOpen) if the
    /// file is missing or not a recognised container,
    /// [`PlaybackError::UnsupportedFormat`](crate::PlaybackError::UnsupportedFormat)
    /// if the stream cannot be played on a device voice.
    fn open(&self, path: &Path) -> Result<Box<dyn SampleDecoder>>;
}
