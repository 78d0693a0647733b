//! Streaming resampler to the 16 kHz engine rate
//!
//! rubato's fixed-input resampler wants exactly `chunk_size` frames per
//! call, while device callbacks arrive in whatever block size the host
//! picks. Input is staged here until a whole chunk is available.

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::{AudioError, Result};

/// Mono streaming resampler
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    chunk_size: usize,
    pending: Vec<f32>,
    inner: Option<SincFixedIn<f32>>,
}

impl Resampler {
    /// Create a resampler from `source_rate` to `target_rate`.
    ///
    /// Equal rates produce a pass-through.
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(AudioError::invalid_config("Sample rate cannot be zero"));
        }

        // 100ms of source audio per rubato call
        let chunk_size = (source_rate as usize / 10).max(1);

        let inner = if source_rate != target_rate {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };

            let resampler = SincFixedIn::<f32>::new(
                target_rate as f64 / source_rate as f64,
                2.0,
                params,
                chunk_size,
                1,
            )
            .map_err(|e| AudioError::ResampleError(format!("Failed to create resampler: {:?}", e)))?;
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            source_rate,
            target_rate,
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
            inner,
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Feed mono samples; returns whatever output became available.
    pub fn push(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(input.to_vec());
        };

        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let planar = inner
                .process(&[chunk], None)
                .map_err(|e| AudioError::ResampleError(format!("Resampling failed: {:?}", e)))?;
            if let Some(channel) = planar.into_iter().next() {
                output.extend(channel);
            }
        }

        Ok(output)
    }

    /// Drop any staged input (between capture sessions)
    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(inner) = self.inner.as_mut() {
            inner.reset();
        }
    }
}

/// Keep the first channel of interleaved input.
///
/// Averaging would halve the amplitude of a microphone that only feeds one
/// side of a stereo pair.
pub fn first_channel(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels as usize)
        .map(|frame| frame[0])
        .collect()
}
