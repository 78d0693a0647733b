//! Float → signed 16-bit PCM frame encoding
//!
//! Frames leave the capture thread as `f32` samples in [-1.0, 1.0] and are
//! shipped to the detection engine as little-endian PCM16, base64 encoded.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::TARGET_SAMPLE_RATE;

/// Full-scale magnitude for negative samples
const NEGATIVE_SCALE: f32 = 32768.0;

/// Full-scale magnitude for non-negative samples
const POSITIVE_SCALE: f32 = 32767.0;

/// One frame of PCM16 audio in transport-safe text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Base64 of the little-endian i16 samples
    pub data: String,
    /// Number of samples carried by `data`
    pub sample_count: usize,
}

impl EncodedFrame {
    /// MIME type announced alongside every frame
    pub fn mime_type() -> String {
        format!("audio/pcm;rate={}", TARGET_SAMPLE_RATE)
    }
}

/// Convert one float sample to PCM16.
///
/// The clamp is written as explicit comparisons so that NaN fails both and
/// falls through unchanged; the saturating `as` cast then maps it to 0.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = if sample > 1.0 {
        1.0
    } else if sample < -1.0 {
        -1.0
    } else {
        sample
    };

    if clamped < 0.0 {
        (clamped * NEGATIVE_SCALE) as i16
    } else {
        (clamped * POSITIVE_SCALE) as i16
    }
}

/// Convert a block of float samples to PCM16
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| sample_to_i16(s)).collect()
}

/// Encode a block of float samples as base64 PCM16LE
pub fn encode_pcm16(samples: &[f32]) -> EncodedFrame {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    EncodedFrame {
        data: BASE64.encode(&bytes),
        sample_count: samples.len(),
    }
}
