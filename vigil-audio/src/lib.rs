//! Vigil Audio
//!
//! Microphone capture and frame preparation for the distress listener.
//!
//! ## Architecture
//!
//! ```text
//! Audio Device (cpal, dedicated thread)
//!   │
//!   ├─> first channel → Resampler (rubato) → 16 kHz mono
//!   │
//!   ├─> AutomaticGain (soft AGC, no noise suppression)
//!   │
//!   └─> fixed 4096-sample frames → FrameCallback
//!          │
//!          ├─> VolumeMeter (FFT byte bins, mean level)
//!          └─> encode_pcm16 (base64 PCM16LE)
//! ```

pub mod capture;
pub mod error;
pub mod gain;
pub mod meter;
pub mod pcm;
pub mod resampler;

pub use capture::{
    list_devices, CpalMicrophone, DeviceInfo, FrameCallback, MicrophoneProvider, MicrophoneStream,
};
pub use error::{AudioError, Result};
pub use gain::AutomaticGain;
pub use meter::{average_level, FrequencyAnalyser, VolumeMeter, DEFAULT_FFT_SIZE};
pub use pcm::{encode_pcm16, sample_to_i16, to_pcm16, EncodedFrame};
pub use resampler::Resampler;

use serde::{Deserialize, Serialize};

/// Engine sample rate (16 kHz mono)
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Samples per frame handed to the session
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Microphone constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Delivered sample rate (default: 16000 Hz)
    pub sample_rate: u32,
    /// Delivered channel count (default: 1 = mono)
    pub channels: u16,
    /// Samples per frame (default: 4096)
    pub frame_size: usize,
    /// Device index (None = default device)
    pub device_index: Option<usize>,
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    /// Always off in practice: suppression would erase the cues being listened for
    pub noise_suppression: bool,
    /// Volume meter FFT size
    pub fft_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: 1,
            frame_size: DEFAULT_FRAME_SIZE,
            device_index: None,
            echo_cancellation: true,
            auto_gain_control: true,
            noise_suppression: false,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::invalid_config("Sample rate cannot be zero"));
        }
        if self.channels != 1 {
            return Err(AudioError::invalid_config(format!(
                "Only mono capture is supported, got {} channels",
                self.channels
            )));
        }
        if self.frame_size == 0 {
            return Err(AudioError::invalid_config("Frame size cannot be zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.frame_size, 4096);
        assert!(config.echo_cancellation);
        assert!(config.auto_gain_control);
        assert!(!config.noise_suppression);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_stereo() {
        let config = AudioConfig {
            channels: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::InvalidConfig(_))));
    }
}
