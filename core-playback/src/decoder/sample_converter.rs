//! # Sample Format Converter
//!
//! Converts decoded `f32` samples into the signed 16-bit little-endian PCM
//! that device voices consume.

/// Sample converter from normalized `f32` to 16-bit PCM.
pub struct SampleConverter;

impl SampleConverter {
    /// Convert one sample, scaling by 32767 and clamping to the `i16` range.
    ///
    /// Out-of-range input (clipped masters, NaN) never wraps around.
    #[inline]
    pub fn to_i16(sample: f32) -> i16 {
        let scaled = sample * i16::MAX as f32;
        if scaled.is_nan() {
            return 0;
        }
        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    /// Convert `samples` and append them to `out` as little-endian bytes.
    ///
    /// `out` is cleared first; its capacity is kept so callers can reuse it.
    pub fn write_pcm16_le(samples: &[f32], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(samples.len() * 2);
        for &sample in samples {
            out.extend_from_slice(&Self::to_i16(sample).to_le_bytes());
        }
    }

    /// Count samples outside `[-1.0, 1.0]`.
    pub fn clipped_count(samples: &[f32]) -> usize {
        samples.iter().filter(|&&s| !(-1.0..=1.0).contains(&s)).count()
    }
}
