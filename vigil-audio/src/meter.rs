//! Loudness feedback for the UI
//!
//! Mirrors what a browser analyser node reports: a smoothed, windowed FFT
//! whose magnitudes are mapped from a fixed decibel range onto one byte per
//! bin. The meter level is the plain mean of those bytes.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Default FFT size (128 frequency bins)
pub const DEFAULT_FFT_SIZE: usize = 256;

const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Byte-per-bin frequency analyser
pub struct FrequencyAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    bins: Vec<u8>,
}

impl FrequencyAnalyser {
    /// Create an analyser; `fft_size` must be a power of two ≥ 32
    pub fn new(fft_size: usize) -> Option<Self> {
        if fft_size < 32 || !fft_size.is_power_of_two() {
            return None;
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Some(Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            bins: vec![0; fft_size / 2],
        })
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse the most recent `fft_size` samples of `samples`.
    ///
    /// Shorter input is left-padded with silence.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> &[u8] {
        let n = self.fft_size;
        let take = samples.len().min(n);
        let tail = &samples[samples.len() - take..];
        let pad = n - take;

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let range = MAX_DECIBELS - MIN_DECIBELS;
        for k in 0..self.bin_count() {
            let magnitude = self.scratch[k].norm() / n as f32;
            let smoothed = SMOOTHING_TIME_CONSTANT * self.smoothed[k]
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            self.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let db = 20.0 * self.smoothed[k].max(1e-12).log10();
            let scaled = (255.0 / range) * (db - MIN_DECIBELS);
            self.bins[k] = scaled.floor().clamp(0.0, 255.0) as u8;
        }

        &self.bins
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;

    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Arithmetic mean of the frequency bins, in [0, 255].
///
/// Returns `None` when there is nothing to average.
pub fn average_level(bins: &[u8]) -> Option<f32> {
    if bins.is_empty() {
        return None;
    }

    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    Some(sum as f32 / bins.len() as f32)
}

/// Best-effort meter wrapped around an optional analyser
pub struct VolumeMeter {
    analyser: Option<FrequencyAnalyser>,
}

impl VolumeMeter {
    pub fn new(fft_size: usize) -> Self {
        Self {
            analyser: FrequencyAnalyser::new(fft_size),
        }
    }

    /// A meter with no analysis buffer; every sample is skipped
    pub fn disabled() -> Self {
        Self { analyser: None }
    }

    /// Level for one frame, or `None` if this frame has to be skipped
    pub fn sample(&mut self, frame: &[f32]) -> Option<f32> {
        let analyser = self.analyser.as_mut()?;
        average_level(analyser.byte_frequency_data(frame))
    }
}
