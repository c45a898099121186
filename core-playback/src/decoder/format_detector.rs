//! # Format Detection Module
//!
//! Probe hints and codec validation for Symphonia.

use crate::error::{PlaybackError, Result};
use std::fmt;
use std::path::Path;
use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Codec families the music decoder knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCodec {
    Vorbis,
    Mp3,
    Flac,
    Pcm,
    Unknown,
}

impl fmt::Display for MusicCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MusicCodec::Vorbis => "vorbis",
            MusicCodec::Mp3 => "mp3",
            MusicCodec::Flac => "flac",
            MusicCodec::Pcm => "pcm",
            MusicCodec::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Format detector for audio files.
pub struct FormatDetector;

impl FormatDetector {
    /// Create a probe hint from the file extension.
    ///
    /// ```rust
    /// use core_playback::decoder::FormatDetector;
    /// use std::path::Path;
    ///
    /// let hint = FormatDetector::hint_from_path(Path::new("music/title.ogg"));
    /// # let _ = hint;
    /// ```
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            debug!("Setting probe hint extension: {}", extension);
            hint.with_extension(extension);
        } else {
            debug!("No file extension found, probe will auto-detect");
        }

        hint
    }

    /// Map a Symphonia codec type onto a [`MusicCodec`].
    pub fn detect_codec(codec_type: CodecType) -> MusicCodec {
        use symphonia::core::codecs::*;

        if codec_type == CODEC_TYPE_VORBIS {
            MusicCodec::Vorbis
        } else if codec_type == CODEC_TYPE_MP3 {
            MusicCodec::Mp3
        } else if codec_type == CODEC_TYPE_FLAC {
            MusicCodec::Flac
        } else if codec_type == CODEC_TYPE_PCM_S16LE
            || codec_type == CODEC_TYPE_PCM_S16BE
            || codec_type == CODEC_TYPE_PCM_S24LE
            || codec_type == CODEC_TYPE_PCM_S24BE
            || codec_type == CODEC_TYPE_PCM_S32LE
            || codec_type == CODEC_TYPE_PCM_S32BE
            || codec_type == CODEC_TYPE_PCM_F32LE
            || codec_type == CODEC_TYPE_PCM_F32BE
            || codec_type == CODEC_TYPE_PCM_U8
        {
            MusicCodec::Pcm
        } else {
            warn!("Unknown codec type: {:?}", codec_type);
            MusicCodec::Unknown
        }
    }

    /// Check that the codec was compiled in.
    pub fn validate_codec_support(codec: MusicCodec) -> Result<()> {
        let (enabled, feature) = match codec {
            MusicCodec::Vorbis => (cfg!(feature = "decoder-vorbis"), "decoder-vorbis"),
            MusicCodec::Mp3 => (cfg!(feature = "decoder-mp3"), "decoder-mp3"),
            MusicCodec::Flac => (cfg!(feature = "decoder-flac"), "decoder-flac"),
            MusicCodec::Pcm => (cfg!(feature = "decoder-wav"), "decoder-wav"),
            MusicCodec::Unknown => {
                return Err(PlaybackError::UnsupportedFormat(
                    "unknown codec".to_string(),
                ))
            }
        };

        if enabled {
            Ok(())
        } else {
            Err(PlaybackError::UnsupportedFormat(format!(
                "{} decoder not enabled. Enable '{}' feature",
                codec, feature
            )))
        }
    }
}
