//! # Symphonia Decoder Implementation
//!
//! Streaming music decoder built on the Symphonia library.

use super::format_detector::{FormatDetector, MusicCodec};
use super::{DecoderFactory, SampleDecoder};
use crate::error::{PlaybackError, Result};
use bridge_traits::{ChannelLayout, PcmFormat};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::Time;
use tracing::{debug, error, info, instrument, warn};

const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia-backed [`SampleDecoder`].
///
/// Decodes one packet at a time into a carry buffer and serves reads from it,
/// so callers may ask for any number of samples regardless of packet size.
///
/// ## State Management
///
/// - Format reader (demuxer) owning the file stream
/// - Codec decoder for the selected track
/// - Carry buffer of interleaved samples not yet handed out
/// - End-of-stream flag, cleared by [`SampleDecoder::seek_to_start`]
pub struct SymphoniaDecoder {
    /// Format reader (demuxer) - owns the media source stream
    format_reader: Box<dyn FormatReader>,

    /// Audio decoder
    decoder: Box<dyn Decoder>,

    /// Selected track ID
    track_id: u32,

    /// Output format
    format: PcmFormat,

    codec: MusicCodec,

    /// Reused conversion buffer, grown to the largest packet seen
    sample_buf: Option<SampleBuffer<f32>>,

    /// Decoded samples not yet returned by `read_samples`
    pending: Vec<f32>,
    pending_pos: usize,

    /// End-of-stream flag
    eof: bool,

    /// Original source (for error reporting)
    source_info: String,
}

impl SymphoniaDecoder {
    /// Open a file and prepare its first audio track for decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened
    /// - The container is not recognized
    /// - No decodable audio track is found
    /// - The codec is not compiled in, or has more than two channels
    #[instrument(skip_all, fields(path = %core_runtime::logging::strip_path(path)))]
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening Symphonia decoder");

        let file = File::open(path).map_err(|e| {
            error!("Failed to open file {:?}: {}", path, e);
            PlaybackError::decode_open(path, e)
        })?;

        let hint = FormatDetector::hint_from_path(path);
        let media_source = Box::new(file) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format probe failed: {}", e);
                PlaybackError::decode_open(path, format!("failed to probe format: {}", e))
            })?;

        let format_reader = probe_result.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                error!("No supported audio tracks found");
                PlaybackError::decode_open(path, "no supported audio tracks")
            })?;

        let track_id = track.id;
        let codec = FormatDetector::detect_codec(track.codec_params.codec);
        FormatDetector::validate_codec_support(codec)?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PlaybackError::decode_open(path, "missing sample rate"))?;

        let channel_count = track
            .codec_params
            .channels
            .map(|ch| ch.count() as u16)
            .ok_or_else(|| PlaybackError::decode_open(path, "missing channel layout"))?;

        let channels = ChannelLayout::from_channel_count(channel_count).ok_or_else(|| {
            PlaybackError::UnsupportedFormat(format!(
                "{} channels (device voices accept mono or stereo)",
                channel_count
            ))
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                PlaybackError::UnsupportedFormat(format!("failed to create codec decoder: {}", e))
            })?;

        info!(
            codec = %codec,
            sample_rate,
            channels = channel_count,
            "Decoder initialized"
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format: PcmFormat::new(sample_rate, channels),
            codec,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            eof: false,
            source_info: path.display().to_string(),
        })
    }

    /// Codec of the selected track.
    pub fn codec(&self) -> MusicCodec {
        self.codec
    }

    /// Decode the next packet of the selected track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream. Corrupted packets are skipped
    /// until [`MAX_CONSECUTIVE_ERRORS`] fail in a row.
    #[instrument(skip(self), level = "trace")]
    fn refill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!(source = %self.source_info, "Reached end of stream");
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Decoder reset required for track list change");
                    return Err(PlaybackError::Decode(
                        "track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::Decode(format!(
                            "stream I/O failure after {} attempts: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    error!("Fatal format reader error: {}", e);
                    return Err(PlaybackError::Decode(format!(
                        "failed to read packet: {}",
                        e
                    )));
                }
            };

            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let decoded_channels = decoded.spec().channels.count() as u16;
                    if decoded_channels != self.format.channels.channel_count() {
                        return Err(PlaybackError::Decode(format!(
                            "channel count changed mid-stream ({} -> {})",
                            self.format.channels.channel_count(),
                            decoded_channels
                        )));
                    }

                    let current = self.sample_buf.as_ref().map(|buf| buf.capacity());
                    if needs_realloc(current, decoded.capacity(), decoded_channels as usize) {
                        self.sample_buf = Some(SampleBuffer::<f32>::new(
                            decoded.capacity() as u64,
                            *decoded.spec(),
                        ));
                    }

                    let Some(sample_buf) = self.sample_buf.as_mut() else {
                        return Err(PlaybackError::InvariantViolation(
                            "decoder sample buffer unavailable".to_string(),
                        ));
                    };
                    sample_buf.copy_interleaved_ref(decoded);

                    self.pending.clear();
                    self.pending.extend_from_slice(sample_buf.samples());
                    self.pending_pos = 0;
                    return Ok(true);
                }
                Err(e @ SymphoniaError::IoError(_)) | Err(e @ SymphoniaError::DecodeError(_)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::Decode(format!(
                            "decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    error!("Fatal decode error: {}", e);
                    return Err(PlaybackError::Decode(format!(
                        "failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.format.channels.channel_count() as usize;
        let want = out.len() - out.len() % channels;
        let mut written = 0;

        while written < want {
            if self.pending_pos >= self.pending.len() {
                if !self.refill()? {
                    break;
                }
                continue;
            }

            let available = self.pending.len() - self.pending_pos;
            let n = (want - written).min(available);
            out[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            written += n;
            self.pending_pos += n;
        }

        Ok(written)
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(0, 0.0),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| {
                error!("Seek failed: {}", e);
                PlaybackError::Seek(e.to_string())
            })?;

        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.eof = false;

        debug!(source = %self.source_info, "Rewound to start");
        Ok(())
    }
}

/// [`DecoderFactory`] producing [`SymphoniaDecoder`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderFactory;

impl DecoderFactory for SymphoniaDecoderFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn SampleDecoder>> {
        Ok(Box::new(SymphoniaDecoder::open(path)?))
    }
}

/// Whether a sample buffer holding `current` interleaved samples is too small
/// for a packet of `frames` frames per channel.
fn needs_realloc(current: Option<usize>, frames: usize, channels: usize) -> bool {
    current.map_or(true, |samples| samples < frames * channels)
}
