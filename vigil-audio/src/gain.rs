//! Software automatic gain control
//!
//! Hosts reached through cpal expose no gain-control switch, so the
//! "auto gain on" capture constraint is honoured here: an RMS envelope
//! drives a bounded boost, followed by a soft limiter.
//!
//! The limiter only rounds off peaks. It does not smooth the signal, so
//! screams and other distress artifacts reach the encoder intact.

/// -12 dBFS RMS target
const TARGET_RMS: f32 = 0.251;

/// +20 dB ceiling
const MAX_GAIN: f32 = 10.0;

/// Never attenuate below unity
const MIN_GAIN: f32 = 1.0;

/// Below this the envelope is treated as room noise and the gain is held
const MIN_RMS_THRESHOLD: f32 = 0.001;

/// -3 dBFS
const SOFT_LIMIT_THRESHOLD: f32 = 0.708;

pub struct AutomaticGain {
    gain: f32,
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl AutomaticGain {
    /// 10 ms attack, 200 ms release at the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        Self {
            gain: 1.0,
            envelope: 0.0,
            attack_coeff: (-1.0 / (rate * 0.010)).exp(),
            release_coeff: (-1.0 / (rate * 0.200)).exp(),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
        self.envelope = 0.0;
    }

    pub fn process_inplace(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = if sample.is_finite() { *sample } else { 0.0 };

            let squared = input * input;
            let coeff = if squared > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * squared;

            let rms = self.envelope.sqrt();
            if rms > MIN_RMS_THRESHOLD {
                let target = (TARGET_RMS / rms).clamp(MIN_GAIN, MAX_GAIN);
                let gain_coeff = if target < self.gain {
                    self.attack_coeff
                } else {
                    self.release_coeff
                };
                self.gain = gain_coeff * self.gain + (1.0 - gain_coeff) * target;
            }

            *sample = soft_limit(input * self.gain);
        }
    }
}

#[inline]
fn soft_limit(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= SOFT_LIMIT_THRESHOLD {
        return sample;
    }

    let headroom = 1.0 - SOFT_LIMIT_THRESHOLD;
    let excess = (magnitude - SOFT_LIMIT_THRESHOLD) / headroom;
    let limited = SOFT_LIMIT_THRESHOLD + headroom * excess.tanh();
    limited.copysign(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_signal_is_boosted() {
        let mut agc = AutomaticGain::new(16000);
        let mut samples: Vec<f32> = (0..16000)
            .map(|i| 0.02 * (i as f32 * 0.3).sin())
            .collect();
        agc.process_inplace(&mut samples);
        assert!(agc.gain() > 1.5, "gain should rise, got {}", agc.gain());
    }

    #[test]
    fn test_output_never_clips() {
        let mut agc = AutomaticGain::new(16000);
        let mut samples = vec![0.99; 4096];
        agc.process_inplace(&mut samples);
        assert!(samples.iter().all(|s| s.abs() < 1.0));
    }

    #[test]
    fn test_silence_holds_unity_gain() {
        let mut agc = AutomaticGain::new(16000);
        let mut samples = vec![0.0; 4096];
        agc.process_inplace(&mut samples);
        assert_eq!(agc.gain(), 1.0);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_non_finite_input_is_silenced() {
        let mut agc = AutomaticGain::new(16000);
        let mut samples = vec![f32::NAN, f32::INFINITY, 0.1];
        agc.process_inplace(&mut samples);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.0);
        assert!(agc.gain().is_finite());
    }

    #[test]
    fn test_reset() {
        let mut agc = AutomaticGain::new(16000);
        let mut samples = vec![0.05; 8000];
        agc.process_inplace(&mut samples);
        agc.reset();
        assert_eq!(agc.gain(), 1.0);
    }
}
