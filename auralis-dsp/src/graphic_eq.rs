// 31-Band Graphic EQ
// ISO third-octave peaking filter bank with persistent per-channel state
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};
use ndarray::{Array2, ArrayView2, Axis};

/// ISO standard third-octave center frequencies, 20 Hz to 20 kHz.
pub const ISO_BAND_CENTERS: [f64; 31] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0,
    8000.0, 10000.0, 12500.0, 16000.0, 20000.0,
];

const BAND_Q: f64 = 4.32; // third-octave bandwidth
pub const NOMINAL_MAX_DB: f64 = 12.0;
pub const HARD_MAX_DB: f64 = 18.0;

/// Soft-knee saturation above `NOMINAL_MAX_DB`, hard clamp at `HARD_MAX_DB`.
/// Monotone, symmetric about zero, bounded, zero-preserving, and passes the
/// linear region through untouched.
pub fn saturate_gain(g: f64) -> f64 {
    let sign = g.signum();
    let mag = g.abs();
    if mag <= NOMINAL_MAX_DB {
        g
    } else if mag < HARD_MAX_DB {
        let span = HARD_MAX_DB - NOMINAL_MAX_DB;
        let saturated = NOMINAL_MAX_DB + span * (1.0 - (-(mag - NOMINAL_MAX_DB) / span).exp());
        sign * saturated
    } else {
        sign * HARD_MAX_DB
    }
}

/// 31-band ISO third-octave graphic EQ. Filter state persists across
/// successive `process` calls on the same instance to avoid boundary clicks
/// between chunks of a stream.
pub struct GraphicEq {
    cascade: BiquadCascade,
    sample_rate: f64,
    num_channels: usize,
}

fn build_coeffs(sample_rate: f64, gains_db: &[f64; 31]) -> Vec<BiquadCoeffs> {
    let nyquist = sample_rate / 2.0;
    ISO_BAND_CENTERS
        .iter()
        .enumerate()
        .map(|(i, &center)| {
            let gain = saturate_gain(gains_db[i]);
            let clamped_center = center.min(nyquist * 0.98);
            BiquadCoeffs::peaking(sample_rate, clamped_center, BAND_Q, gain)
        })
        .collect()
}

impl GraphicEq {
    /// `gains_db` are raw (pre-saturation) per-band gains; saturation is
    /// applied here before coefficients are derived.
    pub fn new(sample_rate: f64, gains_db: &[f64; 31], num_channels: usize) -> Self {
        let num_channels = num_channels.max(1);
        let coeffs = build_coeffs(sample_rate, gains_db);
        Self {
            cascade: BiquadCascade::new(coeffs, num_channels),
            sample_rate,
            num_channels,
        }
    }

    /// Replace the gain set (used when the same stream needs retuning
    /// mid-flight, e.g. intensity changes). Rebuilding coefficients also
    /// resets filter state; callers retuning between chunks accept the tiny
    /// discontinuity this introduces.
    pub fn set_gains(&mut self, gains_db: &[f64; 31]) {
        let coeffs = build_coeffs(self.sample_rate, gains_db);
        self.cascade = BiquadCascade::new(coeffs, self.num_channels);
    }

    /// Process a `(channels, frames)` PCM block through all 31 bands,
    /// persisting filter state per channel across calls.
    pub fn process(&mut self, audio: &ArrayView2<f64>) -> Array2<f64> {
        let num_channels = audio.shape()[0];
        let num_samples = audio.shape()[1];
        let mut output = Array2::zeros((num_channels, num_samples));

        for channel in 0..num_channels.min(self.num_channels) {
            let row = audio.index_axis(Axis(0), channel);
            let processed = self.cascade.process(&row, channel);
            output.index_axis_mut(Axis(0), channel).assign(&processed);
        }

        output
    }

    pub fn reset(&mut self) {
        self.cascade.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturate_gain_linear_passthrough() {
        assert_eq!(saturate_gain(6.0), 6.0);
        assert_eq!(saturate_gain(-6.0), -6.0);
        assert_eq!(saturate_gain(0.0), 0.0);
    }

    #[test]
    fn test_saturate_gain_bounded_and_symmetric() {
        let pos = saturate_gain(30.0);
        let neg = saturate_gain(-30.0);
        assert!(pos <= HARD_MAX_DB);
        assert!(neg >= -HARD_MAX_DB);
        assert!((pos + neg).abs() < 1e-9);
    }

    #[test]
    fn test_saturate_gain_monotone() {
        let xs = [-20.0, -12.0, -5.0, 0.0, 5.0, 12.0, 20.0];
        let ys: Vec<f64> = xs.iter().map(|&x| saturate_gain(x)).collect();
        for w in ys.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn test_eq_zero_gain_is_near_identity() {
        let gains = [0.0; 31];
        let mut eq = GraphicEq::new(44100.0, &gains, 1);
        let mut audio = Array2::<f64>::zeros((1, 1000));
        audio[[0, 0]] = 1.0;
        let out = eq.process(&audio.view());
        assert!(out[[0, 0]].abs() < 2.0);
    }

    #[test]
    fn test_eq_reset_clears_state() {
        let gains = [3.0; 31];
        let mut eq = GraphicEq::new(44100.0, &gains, 1);
        let audio = Array2::<f64>::ones((1, 500));
        let _ = eq.process(&audio.view());
        eq.reset();

        let impulse_after_reset = eq.process(&Array2::<f64>::zeros((1, 10)).view());
        assert!(impulse_after_reset.iter().all(|&v| v.abs() < 1e-9));
    }
}
