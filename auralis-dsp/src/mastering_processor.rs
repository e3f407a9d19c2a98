// Mastering Processor
// Per-stream stateful pipeline: EQ -> compressor -> (multiband) -> level -> harmonic -> limiter
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};
use crate::chunk_ops::PcmBuffer;
use crate::compressor::{Compressor, CompressorConfig, DetectionMode};
use crate::graphic_eq::GraphicEq;
use crate::limiter::{Limiter, LimiterConfig};
use crate::parameter_mapper::MasteringParameters;
use ndarray::{Array2, Axis};

/// Result of processing one chunk. `degraded` is set when any stage fell
/// back to passthrough because of malformed input.
pub struct ProcessOutput {
    pub pcm: PcmBuffer,
    pub degraded: bool,
}

struct Crossover {
    low_pass: BiquadCascade,
    high_pass: BiquadCascade,
}

impl Crossover {
    fn new(sample_rate: f64, cutoff_hz: f64, num_channels: usize) -> Self {
        let lp = BiquadCoeffs::lowpass(sample_rate, cutoff_hz, 0.707);
        let hp = BiquadCoeffs::highpass(sample_rate, cutoff_hz, 0.707);
        Self {
            low_pass: BiquadCascade::new(vec![lp], num_channels),
            high_pass: BiquadCascade::new(vec![hp], num_channels),
        }
    }
}

/// Stateful per-(parameter set, sample rate) mastering pipeline. A given
/// instance is exclusively owned by one ChunkProcessor; different instances
/// run freely in parallel.
pub struct MasteringProcessor {
    params: MasteringParameters,
    sample_rate: f64,
    num_channels: usize,

    eq: GraphicEq,
    compressors: Vec<Compressor>,
    crossover_low: Crossover,
    crossover_high: Crossover,
    band_compressors: Option<[Vec<Compressor>; 3]>,
    limiters: Vec<Limiter>,
}

fn compressor_config(sample_rate: f64, p: &crate::parameter_mapper::CompressorParams) -> CompressorConfig {
    CompressorConfig {
        sample_rate: sample_rate as usize,
        threshold_db: p.threshold_db as f32,
        ratio: p.ratio as f32,
        knee_db: 6.0,
        attack_ms: p.attack_ms as f32,
        release_ms: p.release_ms as f32,
        makeup_gain_db: p.makeup_gain_db as f32,
        enable_lookahead: true,
        lookahead_ms: 5.0,
    }
}

impl MasteringProcessor {
    pub fn new(params: MasteringParameters, sample_rate: f64, num_channels: usize, multiband_enabled: bool) -> Self {
        let num_channels = num_channels.max(1);
        let eq = GraphicEq::new(sample_rate, &params.eq_gains_db, num_channels);

        let compressors = (0..num_channels)
            .map(|_| Compressor::new(compressor_config(sample_rate, &params.compressor)))
            .collect();

        let crossover_low = Crossover::new(sample_rate, 250.0, num_channels);
        let crossover_high = Crossover::new(sample_rate, 2000.0, num_channels);

        let band_compressors = if multiband_enabled {
            let make = |p: &crate::parameter_mapper::CompressorParams| {
                (0..num_channels)
                    .map(|_| Compressor::new(compressor_config(sample_rate, p)))
                    .collect::<Vec<_>>()
            };
            Some([
                make(&params.multiband.low),
                make(&params.multiband.mid),
                make(&params.multiband.high),
            ])
        } else {
            None
        };

        let limiter_config = LimiterConfig {
            sample_rate: sample_rate as usize,
            threshold_db: -(params.level.headroom_db.max(0.1)) as f32,
            release_ms: 50.0,
            lookahead_ms: 1.5,
            isr_enabled: true,
            oversampling: 1,
        };
        let limiters = (0..num_channels).map(|_| Limiter::new(limiter_config.clone())).collect();

        Self {
            params,
            sample_rate,
            num_channels,
            eq,
            compressors,
            crossover_low,
            crossover_high,
            band_compressors,
            limiters,
        }
    }

    /// Swap in a new parameter set, preserving DSP state (EQ coefficients
    /// rebuild and reset; compressor/limiter configs update in place).
    pub fn retune(&mut self, params: MasteringParameters) {
        self.eq.set_gains(&params.eq_gains_db);
        for c in self.compressors.iter_mut() {
            *c = Compressor::new(compressor_config(self.sample_rate, &params.compressor));
        }
        self.params = params;
    }

    fn waveshape(&self, x: f32, amount: f64) -> f32 {
        if amount <= 0.0 {
            return x;
        }
        let drive = 1.0 + amount as f32 * 4.0;
        (x * drive).tanh() / drive.tanh().max(1e-6)
    }

    fn exciter_highshelf(&self, channel: &mut [f32], amount: f64) {
        if amount <= 0.0 || channel.len() < 2 {
            return;
        }
        let amount = amount as f32;
        let mut prev = channel[0];
        for sample in channel.iter_mut() {
            let hf = *sample - prev;
            prev = *sample;
            *sample += hf * amount * 0.5;
        }
    }

    /// Process one chunk through the full pipeline. Drops to passthrough
    /// (with `degraded = true`) if the input contains non-finite samples or
    /// a channel-count mismatch.
    pub fn process(&mut self, chunk: &PcmBuffer, fast_start: bool) -> ProcessOutput {
        if chunk.data.iter().any(|v| !v.is_finite()) || chunk.channels() == 0 {
            return ProcessOutput { pcm: chunk.clone(), degraded: true };
        }

        let channels = chunk.channels().min(self.num_channels);
        let frames = chunk.frames();

        // 1. EQ
        let eq_out = self.eq.process(&chunk.data.view());

        // 2. Compressor (per channel, f32 domain)
        let mut compressed = Array2::<f64>::zeros((channels, frames));
        for ch in 0..channels {
            let row_f32: Vec<f32> = eq_out.index_axis(Axis(0), ch).iter().map(|&v| v as f32).collect();
            let (out, _) = self.compressors[ch].process(&row_f32, DetectionMode::Hybrid);
            for (i, &v) in out.iter().enumerate() {
                compressed[[ch, i]] = v as f64;
            }
        }

        // 3. Optional multiband pass
        let multiband_active = self.band_compressors.is_some() && !(fast_start);
        let post_multiband = if multiband_active {
            self.apply_multiband(&compressed, channels)
        } else {
            compressed
        };

        // 4. Level gain, respecting safety margin
        let gain_linear = 10f64.powf((self.params.level.gain_db - self.params.level.safety_margin_db) / 20.0);
        let mut leveled = post_multiband;
        leveled.mapv_inplace(|v| v * gain_linear);

        // 5. Harmonic enhancement
        let harmonic = self.params.harmonic;
        if harmonic.enabled {
            for ch in 0..channels {
                let mut row: Vec<f32> = leveled.index_axis(Axis(0), ch).iter().map(|&v| v as f32).collect();
                if harmonic.saturation_enabled {
                    for s in row.iter_mut() {
                        *s = self.waveshape(*s, harmonic.saturation_amount);
                    }
                }
                if harmonic.exciter_enabled {
                    self.exciter_highshelf(&mut row, harmonic.exciter_amount);
                }
                for (i, &v) in row.iter().enumerate() {
                    leveled[[ch, i]] = v as f64;
                }
            }
        }

        // 6. Soft limiter
        let mut limited = Array2::<f64>::zeros((channels, frames));
        for ch in 0..channels {
            let row_f32: Vec<f32> = leveled.index_axis(Axis(0), ch).iter().map(|&v| v as f32).collect();
            let (out, _) = self.limiters[ch].process(&row_f32);
            for (i, &v) in out.iter().enumerate() {
                limited[[ch, i]] = v as f64;
            }
        }

        ProcessOutput {
            pcm: PcmBuffer { data: limited, sample_rate: chunk.sample_rate },
            degraded: false,
        }
    }

    fn apply_multiband(&mut self, audio: &Array2<f64>, channels: usize) -> Array2<f64> {
        let frames = audio.shape()[1];
        let mut low = Array2::<f64>::zeros((channels, frames));
        let mut mid = Array2::<f64>::zeros((channels, frames));
        let mut high = Array2::<f64>::zeros((channels, frames));

        for ch in 0..channels {
            let row = audio.index_axis(Axis(0), ch);
            let below_250 = self.crossover_low.low_pass.process(&row, ch);
            let above_250 = self.crossover_low.high_pass.process(&row, ch);
            let mid_band = self.crossover_high.low_pass.process(&above_250.view(), ch);
            let high_band = self.crossover_high.high_pass.process(&above_250.view(), ch);

            low.index_axis_mut(Axis(0), ch).assign(&below_250);
            mid.index_axis_mut(Axis(0), ch).assign(&mid_band);
            high.index_axis_mut(Axis(0), ch).assign(&high_band);
        }

        let bands = self.band_compressors.as_mut().expect("multiband_active implies Some");
        let mut sum = Array2::<f64>::zeros((channels, frames));
        for (band_data, band_comp) in [(&low, &mut bands[0]), (&mid, &mut bands[1]), (&high, &mut bands[2])] {
            for ch in 0..channels {
                let row_f32: Vec<f32> = band_data.index_axis(Axis(0), ch).iter().map(|&v| v as f32).collect();
                let (out, _) = band_comp[ch].process(&row_f32, DetectionMode::Hybrid);
                for (i, &v) in out.iter().enumerate() {
                    sum[[ch, i]] += v as f64;
                }
            }
        }

        sum
    }

    pub fn reset(&mut self) {
        self.eq.reset();
        for c in self.compressors.iter_mut() {
            c.reset();
        }
        for l in self.limiters.iter_mut() {
            l.reset();
        }
        if let Some(bands) = self.band_compressors.as_mut() {
            for band in bands.iter_mut() {
                for c in band.iter_mut() {
                    c.reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint_compute::AudioFingerprint;
    use crate::parameter_mapper::map_parameters;

    fn test_params() -> MasteringParameters {
        let fp = AudioFingerprint::neutral("full-track");
        map_parameters(&fp, "adaptive", 0.5, -14.0)
    }

    #[test]
    fn test_process_preserves_shape() {
        let mut mp = MasteringProcessor::new(test_params(), 44100.0, 2, false);
        let chunk = PcmBuffer { data: Array2::<f64>::zeros((2, 4096)), sample_rate: 44100 };
        let out = mp.process(&chunk, false);
        assert!(!out.degraded);
        assert_eq!(out.pcm.frames(), 4096);
        assert_eq!(out.pcm.channels(), 2);
    }

    #[test]
    fn test_malformed_input_falls_back_to_passthrough() {
        let mut mp = MasteringProcessor::new(test_params(), 44100.0, 1, false);
        let mut data = Array2::<f64>::zeros((1, 100));
        data[[0, 0]] = f64::NAN;
        let chunk = PcmBuffer { data, sample_rate: 44100 };
        let out = mp.process(&chunk, false);
        assert!(out.degraded);
        assert!(out.pcm.data[[0, 0]].is_nan());
    }

    #[test]
    fn test_multiband_pipeline_runs() {
        let mut mp = MasteringProcessor::new(test_params(), 44100.0, 1, true);
        let chunk = PcmBuffer { data: Array2::<f64>::ones((1, 4096)), sample_rate: 44100 };
        let out = mp.process(&chunk, false);
        assert!(!out.degraded);
        assert!(out.pcm.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fast_start_bypasses_multiband() {
        let mut mp = MasteringProcessor::new(test_params(), 44100.0, 1, true);
        let chunk = PcmBuffer { data: Array2::<f64>::ones((1, 4096)), sample_rate: 44100 };
        let out = mp.process(&chunk, true);
        assert!(!out.degraded);
    }

    #[test]
    fn test_reset_does_not_panic() {
        let mut mp = MasteringProcessor::new(test_params(), 44100.0, 2, true);
        mp.reset();
    }
}
