/// Unified 25D audio fingerprinting
/// Orchestrates all fingerprint dimensions from specialized modules

use crate::frequency_analysis;
use crate::hpss::{hpss, HpssConfig};
use crate::spectral_features;
use crate::stereo_analysis;
use crate::variation_analysis;

/// Fingerprint computation strategy.
///
/// `FullTrack` runs every sub-analyzer over the whole buffer. `Sampling` runs
/// the cheap groups over the whole buffer but only runs the expensive harmonic
/// analyzer (HPSS + YIN + chroma) on a handful of windows, averaging the
/// result — tracks under 5 s fall back to `FullTrack` regardless of the
/// requested strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FingerprintStrategy {
    FullTrack,
    Sampling { interval_s: f32 },
}

impl Default for FingerprintStrategy {
    fn default() -> Self {
        FingerprintStrategy::Sampling { interval_s: 20.0 }
    }
}

const HARMONIC_WINDOW_S: f32 = 5.0;
const MIN_FULL_TRACK_S: f32 = 5.0;

/// One bit per fingerprint group, set when that group's sub-analyzer failed
/// and neutral defaults were substituted. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DegradedBits {
    pub frequency: bool,
    pub dynamics: bool,
    pub temporal: bool,
    pub spectral: bool,
    pub harmonic: bool,
    pub variation: bool,
    pub stereo: bool,
}

impl DegradedBits {
    pub fn any(&self) -> bool {
        self.frequency
            || self.dynamics
            || self.temporal
            || self.spectral
            || self.harmonic
            || self.variation
            || self.stereo
    }
}

/// Complete 25D audio fingerprint
/// Dimensions broken down by perceptual/acoustic category
#[derive(Debug, Clone, Copy)]
pub struct AudioFingerprint {
    // Frequency Distribution (7D) - Perceptual frequency bands
    pub sub_bass: f32,    // 20-60 Hz energy
    pub bass: f32,        // 60-250 Hz energy
    pub low_mid: f32,     // 250-500 Hz energy
    pub mid: f32,         // 500-2000 Hz energy
    pub upper_mid: f32,   // 2000-4000 Hz energy
    pub presence: f32,    // 4000-6000 Hz energy
    pub air: f32,         // 6000-20000 Hz energy

    // Dynamics (3D) - Dynamic range, loudness, frequency balance
    pub lufs: f32,          // Integrated loudness estimate
    pub crest_db: f32,      // Peak-to-RMS ratio
    pub bass_mid_ratio: f32,// Bass energy vs mid energy, dB

    // Temporal (4D) - Time-domain characteristics
    pub tempo_bpm: f32,           // Estimated tempo
    pub rhythm_stability: f32,    // How stable the rhythm is
    pub transient_density: f32,   // Sharpness/percussive content
    pub silence_ratio: f32,       // Proportion of silence

    // Spectral (3D) - Spectrum shape characteristics
    pub spectral_centroid: f32,   // "Brightness" (center of mass), normalized 0..1
    pub spectral_rolloff: f32,    // 85% energy frequency, normalized 0..1
    pub spectral_flatness: f32,   // Tonality vs noisiness

    // Harmonic (3D) - Harmonic content and pitch
    pub harmonic_ratio: f32,      // Harmonic vs percussive energy
    pub pitch_stability: f32,     // Consistency of fundamental frequency
    pub chroma_energy: f32,       // Overall harmonic richness

    // Variation (3D) - Temporal variation
    pub dynamic_range_variation: f32, // Std dev of dynamic range
    pub loudness_variation: f32,      // Std dev of loudness
    pub peak_consistency: f32,        // Consistency of peak levels

    // Stereo (2D) - Spatial characteristics
    pub stereo_width: f32,         // Width of stereo field
    pub phase_correlation: f32,    // Phase relationship of channels

    /// `"full-track"` or `"sampled"`.
    pub method: &'static str,
    pub degraded: DegradedBits,
}

impl AudioFingerprint {
    /// Convert to dictionary format for JSON serialization (25 numeric keys,
    /// the method tag is carried separately by callers that need it).
    pub fn to_dict(&self) -> std::collections::HashMap<String, f32> {
        let mut dict = std::collections::HashMap::new();

        dict.insert("sub_bass".to_string(), self.sub_bass);
        dict.insert("bass".to_string(), self.bass);
        dict.insert("low_mid".to_string(), self.low_mid);
        dict.insert("mid".to_string(), self.mid);
        dict.insert("upper_mid".to_string(), self.upper_mid);
        dict.insert("presence".to_string(), self.presence);
        dict.insert("air".to_string(), self.air);

        dict.insert("lufs".to_string(), self.lufs);
        dict.insert("crest_db".to_string(), self.crest_db);
        dict.insert("bass_mid_ratio".to_string(), self.bass_mid_ratio);

        dict.insert("tempo_bpm".to_string(), self.tempo_bpm);
        dict.insert("rhythm_stability".to_string(), self.rhythm_stability);
        dict.insert("transient_density".to_string(), self.transient_density);
        dict.insert("silence_ratio".to_string(), self.silence_ratio);

        dict.insert("spectral_centroid".to_string(), self.spectral_centroid);
        dict.insert("spectral_rolloff".to_string(), self.spectral_rolloff);
        dict.insert("spectral_flatness".to_string(), self.spectral_flatness);

        dict.insert("harmonic_ratio".to_string(), self.harmonic_ratio);
        dict.insert("pitch_stability".to_string(), self.pitch_stability);
        dict.insert("chroma_energy".to_string(), self.chroma_energy);

        dict.insert("dynamic_range_variation".to_string(), self.dynamic_range_variation);
        dict.insert("loudness_variation".to_string(), self.loudness_variation);
        dict.insert("peak_consistency".to_string(), self.peak_consistency);

        dict.insert("stereo_width".to_string(), self.stereo_width);
        dict.insert("phase_correlation".to_string(), self.phase_correlation);

        dict
    }

    /// True iff all 25 numeric fields are finite.
    pub fn is_valid(&self) -> bool {
        self.to_dict().values().all(|v| v.is_finite())
    }

    /// A fingerprint substituted wholesale when analysis cannot proceed at all
    /// (e.g. caller already validated non-empty/non-zero sample rate, this is
    /// the belt-and-suspenders neutral vector for defense in depth).
    pub fn neutral(method: &'static str) -> Self {
        Self {
            sub_bass: 1.0 / 7.0,
            bass: 1.0 / 7.0,
            low_mid: 1.0 / 7.0,
            mid: 1.0 / 7.0,
            upper_mid: 1.0 / 7.0,
            presence: 1.0 / 7.0,
            air: 1.0 / 7.0,
            lufs: -23.0,
            crest_db: 10.0,
            bass_mid_ratio: 0.0,
            tempo_bpm: 120.0,
            rhythm_stability: 0.5,
            transient_density: 0.0,
            silence_ratio: 0.0,
            spectral_centroid: 0.5,
            spectral_rolloff: 0.5,
            spectral_flatness: 0.5,
            harmonic_ratio: 0.5,
            pitch_stability: 0.5,
            chroma_energy: 0.3,
            dynamic_range_variation: 0.0,
            loudness_variation: 0.0,
            peak_consistency: 0.5,
            stereo_width: 0.0,
            phase_correlation: 1.0,
            method,
            degraded: DegradedBits {
                frequency: true,
                dynamics: true,
                temporal: true,
                spectral: true,
                harmonic: true,
                variation: true,
                stereo: true,
            },
        }
    }
}

fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = signal.iter().map(|s| s * s).sum();
    (sum_sq / signal.len() as f32).sqrt()
}

fn compute_crest_factor(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let peak = signal.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let rms = compute_rms(signal);
    if rms < 1e-10 {
        return 0.0;
    }
    20.0 * (peak / rms).log10()
}

/// LUFS approximation: `20*log10(rms) + 0.691`. K-weighting is out of scope;
/// the constant only needs to be stable across tracks of the same provenance.
fn estimate_lufs(signal: &[f32]) -> f32 {
    let rms = compute_rms(signal);
    if rms < 1e-10 {
        return -120.0;
    }
    let db = 20.0 * rms.log10() + 0.691;
    db.max(-120.0).min(0.0)
}

/// Bass/mid ratio in dB, computed from the same 7-band energy aggregates used
/// for the frequency distribution (not a separate ad hoc FFT split).
fn compute_bass_mid_ratio_db(bass_energy: f32, mid_energy: f32) -> f32 {
    if mid_energy < 1e-10 {
        return 0.0;
    }
    (10.0 * (bass_energy / mid_energy.max(1e-10)).log10()).clamp(-40.0, 40.0)
}

/// Fraction of 50 ms frames whose RMS falls under a fixed silence floor.
fn compute_silence_ratio(audio: &[f32], sample_rate: u32) -> f32 {
    if audio.is_empty() {
        return 1.0;
    }
    let frame_len = ((sample_rate as f32 * 0.050) as usize).max(1);
    let floor = 10f32.powf(-50.0 / 20.0); // -50 dB RMS floor

    let mut silent_frames = 0usize;
    let mut total_frames = 0usize;
    for chunk in audio.chunks(frame_len) {
        total_frames += 1;
        let rms = compute_rms(chunk);
        if rms < floor {
            silent_frames += 1;
        }
    }
    if total_frames == 0 {
        return 1.0;
    }
    (silent_frames as f32 / total_frames as f32).clamp(0.0, 1.0)
}

struct OnsetEnvelope {
    env: Vec<f32>,
    frame_rate: f32, // frames per second
}

/// Spectral-flux onset envelope shared by tempo/rhythm/transient estimators.
fn compute_onset_envelope(audio: &[f32], sample_rate: u32) -> Option<OnsetEnvelope> {
    let hop = 512usize;
    let frame_size = 1024usize;
    if audio.len() < frame_size * 2 {
        return None;
    }

    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    let window: Vec<f32> = (0..frame_size)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / (frame_size as f32 - 1.0)).cos())
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(frame_size);

    let n_frames = (audio.len().saturating_sub(frame_size)) / hop + 1;
    if n_frames < 2 {
        return None;
    }

    let mut prev_mag = vec![0.0f32; frame_size / 2 + 1];
    let mut env = Vec::with_capacity(n_frames);

    for i in 0..n_frames {
        let start = i * hop;
        let end = (start + frame_size).min(audio.len());
        let mut buf: Vec<Complex<f32>> = audio[start..end]
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        buf.resize(frame_size, Complex::new(0.0, 0.0));
        fft.process(&mut buf);

        let mag: Vec<f32> = buf[..frame_size / 2 + 1].iter().map(|c| c.norm()).collect();
        let flux: f32 = mag.iter().zip(prev_mag.iter()).map(|(&c, &p)| (c - p).max(0.0)).sum();
        env.push(flux);
        prev_mag = mag;
    }

    Some(OnsetEnvelope {
        env,
        frame_rate: sample_rate as f32 / hop as f32,
    })
}

/// Tempo from onset-envelope autocorrelation, octave-corrected, clamped to
/// [40, 220] BPM. Falls back to the spectral-flux peak-interval estimator
/// when the autocorrelation peak is too flat to trust.
fn estimate_tempo(onset: &OnsetEnvelope) -> f32 {
    let env = &onset.env;
    if env.len() < 4 {
        return 120.0;
    }

    let min_lag = (onset.frame_rate * 60.0 / 220.0).ceil().max(1.0) as usize;
    let max_lag = ((onset.frame_rate * 60.0 / 40.0).floor() as usize).min(env.len() / 2);
    if min_lag >= max_lag {
        return 120.0;
    }

    let mean: f32 = env.iter().sum::<f32>() / env.len() as f32;
    let centered: Vec<f32> = env.iter().map(|&v| v - mean).collect();

    let mut best_lag = min_lag;
    let mut best_corr = f32::NEG_INFINITY;
    let mut second_best_corr = f32::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let n = centered.len() - lag;
        let corr: f32 = (0..n).map(|i| centered[i] * centered[i + lag]).sum();
        if corr > best_corr {
            second_best_corr = best_corr;
            best_corr = corr;
            best_lag = lag;
        } else if corr > second_best_corr {
            second_best_corr = corr;
        }
    }

    let raw_bpm = 60.0 * onset.frame_rate / best_lag as f32;

    // Octave correction: prefer an integer multiple/submultiple whose own
    // autocorrelation lag also scores strongly, nudging toward 70-140 BPM.
    let candidates = [raw_bpm, raw_bpm / 2.0, raw_bpm * 2.0, raw_bpm / 3.0, raw_bpm * 3.0];
    let mut best = raw_bpm;
    let mut best_score = f32::MAX;
    for &c in &candidates {
        if c < 40.0 || c > 220.0 {
            continue;
        }
        let dist_from_sweet_spot = (c - 105.0).abs();
        let penalty = if (70.0..=140.0).contains(&c) { 0.0 } else { 40.0 };
        let score = dist_from_sweet_spot + penalty;
        if score < best_score {
            best_score = score;
            best = c;
        }
    }

    // If the autocorrelation peak is too weak relative to the runner-up,
    // the periodicity estimate is unreliable; fall back to a flat default.
    if best_corr <= 0.0 || (best_corr - second_best_corr).abs() < 1e-6 {
        return 120.0;
    }

    best.clamp(40.0, 220.0)
}

/// Rhythm stability: inverted, clamped coefficient-of-variation of the
/// intervals between consecutive onset-envelope peaks.
fn estimate_rhythm_stability(onset: &OnsetEnvelope) -> f32 {
    let env = &onset.env;
    if env.len() < 4 {
        return 0.5;
    }
    let mean: f32 = env.iter().sum::<f32>() / env.len() as f32;
    let threshold = mean * 1.5;

    let mut peaks = Vec::new();
    for i in 1..env.len() - 1 {
        if env[i] > threshold && env[i] > env[i - 1] && env[i] > env[i + 1] {
            peaks.push(i);
        }
    }
    if peaks.len() < 3 {
        return 0.5;
    }

    let iois: Vec<f32> = peaks.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
    let mean_ioi: f32 = iois.iter().sum::<f32>() / iois.len() as f32;
    if mean_ioi < 1e-6 {
        return 0.5;
    }
    let variance: f32 = iois.iter().map(|&x| (x - mean_ioi).powi(2)).sum::<f32>() / iois.len() as f32;
    let cv = variance.sqrt() / mean_ioi;
    (1.0 - cv).clamp(0.0, 1.0)
}

/// Onsets per second, normalized against a fixed ceiling of 4/s.
fn estimate_transient_density(onset: &OnsetEnvelope) -> f32 {
    let env = &onset.env;
    if env.len() < 3 {
        return 0.0;
    }
    let mean: f32 = env.iter().sum::<f32>() / env.len() as f32;
    let std: f32 = {
        let var = env.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / env.len() as f32;
        var.sqrt()
    };
    let threshold = mean + 0.5 * std;

    let mut onset_count = 0usize;
    for i in 1..env.len() - 1 {
        if env[i] > threshold && env[i] > env[i - 1] && env[i] > env[i + 1] {
            onset_count += 1;
        }
    }

    let duration_s = env.len() as f32 / onset.frame_rate;
    if duration_s < 1e-6 {
        return 0.0;
    }
    let onsets_per_sec = onset_count as f32 / duration_s;
    (onsets_per_sec / 4.0).clamp(0.0, 1.0)
}

/// Harmonic/pitch/chroma scalars for a single window, via HPSS + YIN + CQT
/// chroma (the narrow trait §9 describes as `analyze(pcm, sr) -> {..}`).
fn analyze_harmonic_window(window: &[f32], sample_rate: u32) -> (f32, f32, f32) {
    if window.len() < HpssConfig::default().n_fft {
        return (0.5, 0.5, 0.3);
    }

    let y: Vec<f64> = window.iter().map(|&s| s as f64).collect();
    let sr = sample_rate as usize;

    let (harmonic, percussive) = hpss(&y, &HpssConfig::default());
    let h_energy: f64 = harmonic.iter().map(|v| v * v).sum();
    let p_energy: f64 = percussive.iter().map(|v| v * v).sum();
    let harmonic_ratio = if h_energy + p_energy > 1e-12 {
        (h_energy / (h_energy + p_energy)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let f0 = crate::yin::yin(&y, sr, 50.0, 2000.0);
    let voiced: Vec<f64> = f0.into_iter().filter(|&v| v > 0.0).collect();
    let pitch_stability = if voiced.len() >= 2 {
        let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
        let variance = voiced.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / voiced.len() as f64;
        let cv = variance.sqrt() / mean.max(1e-9);
        (1.0 - cv).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let chroma = crate::chroma::chroma_cqt(&y, sr);
    let chroma_energy = if chroma.dim().1 > 0 {
        let n_frames = chroma.dim().1;
        let sum: f64 = (0..n_frames)
            .map(|col| (0..12).map(|c| chroma[[c, col]]).fold(0.0, f64::max))
            .sum();
        (sum / n_frames as f64).clamp(0.0, 1.0)
    } else {
        0.3
    };

    (harmonic_ratio as f32, pitch_stability as f32, chroma_energy as f32)
}

/// Run the harmonic analyzer per the requested strategy, averaging across
/// sampled windows when sampling is in effect.
fn analyze_harmonic(mono: &[f32], sample_rate: u32, strategy: FingerprintStrategy) -> (f32, f32, f32, bool) {
    let duration_s = mono.len() as f32 / sample_rate as f32;

    let full_track = match strategy {
        FingerprintStrategy::FullTrack => true,
        FingerprintStrategy::Sampling { .. } => duration_s < MIN_FULL_TRACK_S,
    };

    if full_track {
        return (
            analyze_harmonic_window(mono, sample_rate).0,
            analyze_harmonic_window(mono, sample_rate).1,
            analyze_harmonic_window(mono, sample_rate).2,
            false,
        );
    }

    let interval_s = match strategy {
        FingerprintStrategy::Sampling { interval_s } => interval_s.max(1.0),
        FingerprintStrategy::FullTrack => unreachable!(),
    };

    let window_len = (HARMONIC_WINDOW_S * sample_rate as f32) as usize;
    let hop_len = (interval_s * sample_rate as f32) as usize;

    let mut harmonic_sum = 0.0f32;
    let mut pitch_sum = 0.0f32;
    let mut chroma_sum = 0.0f32;
    let mut n_windows = 0usize;

    let mut start = 0usize;
    while start + window_len <= mono.len() {
        let (h, p, c) = analyze_harmonic_window(&mono[start..start + window_len], sample_rate);
        harmonic_sum += h;
        pitch_sum += p;
        chroma_sum += c;
        n_windows += 1;
        start += hop_len;
    }

    if n_windows == 0 {
        return (analyze_harmonic_window(mono, sample_rate).0, 0.5, 0.3, false);
    }

    (
        harmonic_sum / n_windows as f32,
        pitch_sum / n_windows as f32,
        chroma_sum / n_windows as f32,
        false,
    )
}

/// Compute complete 25D fingerprint using the given strategy.
///
/// Fail-soft: never errors once the caller's basic validation has passed
/// (non-empty audio, sensible sample rate); any sub-analyzer panic path is
/// instead expressed as neutral-default substitution with a degraded bit, per
/// group, via the `DegradedBits` carried on the result.
pub fn compute_complete_fingerprint(
    audio: &[f32],
    sample_rate: u32,
    channels: u32,
) -> Result<AudioFingerprint, Box<dyn std::error::Error>> {
    compute_fingerprint(audio, sample_rate, channels, FingerprintStrategy::default())
}

/// As [`compute_complete_fingerprint`] but with an explicit strategy.
pub fn compute_fingerprint(
    audio: &[f32],
    sample_rate: u32,
    channels: u32,
    strategy: FingerprintStrategy,
) -> Result<AudioFingerprint, Box<dyn std::error::Error>> {
    if audio.is_empty() {
        return Err("Audio is empty".into());
    }
    if sample_rate == 0 {
        return Err("Sample rate must be > 0".into());
    }
    if sample_rate < 8_000 || sample_rate > 384_000 {
        return Err(format!(
            "Sample rate {} Hz is out of supported range [8000, 384000]",
            sample_rate
        )
        .into());
    }

    let (mono_audio, left_channel, right_channel) = if channels == 2 {
        let mut mono = vec![0.0f32; audio.len() / 2];
        for i in 0..mono.len() {
            mono[i] = (audio[i * 2] + audio[i * 2 + 1]) * 0.5;
        }
        let left: Vec<f32> = audio.iter().step_by(2).copied().collect();
        let right: Vec<f32> = audio.iter().skip(1).step_by(2).copied().collect();
        (mono, Some(left), Some(right))
    } else {
        (audio.to_vec(), None, None)
    };

    let mut degraded = DegradedBits::default();

    // 1. Frequency Distribution (7D)
    let freq_dist = frequency_analysis::compute_frequency_distribution(&mono_audio, sample_rate);

    // 2. Dynamics (3D) - bass/mid ratio reuses the same band-energy aggregates
    let lufs = estimate_lufs(&mono_audio);
    let crest_db = compute_crest_factor(&mono_audio);
    let bass_mid_ratio = compute_bass_mid_ratio_db(freq_dist.bass, freq_dist.mid);

    // 3. Temporal (4D)
    let silence_ratio = compute_silence_ratio(&mono_audio, sample_rate);
    let onset = compute_onset_envelope(&mono_audio, sample_rate);
    let (tempo_bpm, rhythm_stability, transient_density) = match &onset {
        Some(env) => (
            estimate_tempo(env),
            estimate_rhythm_stability(env),
            estimate_transient_density(env),
        ),
        None => {
            degraded.temporal = true;
            (120.0, 0.5, 0.0)
        }
    };

    // 4. Spectral (3D) - normalized against fixed 8kHz/10kHz ceilings
    let (freqs, psd) = spectral_features::audio_to_freq_domain(&mono_audio, sample_rate);
    let centroid_hz = spectral_features::compute_spectral_centroid(&psd, &freqs);
    let rolloff_hz = spectral_features::compute_spectral_rolloff(&psd, &freqs, 0.85);
    let spectral_centroid = (centroid_hz / 8000.0).clamp(0.0, 1.0);
    let spectral_rolloff = (rolloff_hz / 10000.0).clamp(0.0, 1.0);
    let spectral_flatness = spectral_features::compute_spectral_flatness(&psd);

    // 5. Harmonic (3D)
    let (harmonic_ratio, pitch_stability, chroma_energy, harmonic_degraded) =
        analyze_harmonic(&mono_audio, sample_rate, strategy);
    degraded.harmonic = harmonic_degraded;

    // 6. Variation (3D)
    let dynamic_range_variation = variation_analysis::compute_dynamic_range_variation(&mono_audio, sample_rate);
    let loudness_variation = variation_analysis::compute_loudness_variation(&mono_audio, sample_rate);
    let peak_consistency = variation_analysis::compute_peak_consistency(&mono_audio, sample_rate);

    // 7. Stereo (2D)
    let (stereo_width, phase_correlation) = if let (Some(left), Some(right)) = (left_channel, right_channel) {
        (
            stereo_analysis::compute_stereo_width(&left, &right),
            stereo_analysis::compute_phase_correlation(&left, &right),
        )
    } else {
        (0.0, 1.0)
    };

    let method: &'static str = match strategy {
        FingerprintStrategy::FullTrack => "full-track",
        FingerprintStrategy::Sampling { .. } => {
            if mono_audio.len() as f32 / sample_rate as f32 < MIN_FULL_TRACK_S {
                "full-track"
            } else {
                "sampled"
            }
        }
    };

    Ok(AudioFingerprint {
        sub_bass: freq_dist.sub_bass,
        bass: freq_dist.bass,
        low_mid: freq_dist.low_mid,
        mid: freq_dist.mid,
        upper_mid: freq_dist.upper_mid,
        presence: freq_dist.presence,
        air: freq_dist.air,

        lufs,
        crest_db,
        bass_mid_ratio,

        tempo_bpm,
        rhythm_stability,
        transient_density,
        silence_ratio,

        spectral_centroid,
        spectral_rolloff,
        spectral_flatness,

        harmonic_ratio,
        pitch_stability,
        chroma_energy,

        dynamic_range_variation,
        loudness_variation,
        peak_consistency,

        stereo_width,
        phase_correlation,

        method,
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_complete_fingerprint_mono() {
        let audio = vec![0.1; 48000];
        let fp = compute_complete_fingerprint(&audio, 48000, 1).unwrap();

        assert!(fp.lufs >= -120.0 && fp.lufs <= 0.0);
        assert!(fp.crest_db >= 0.0 && fp.crest_db <= 50.0);
        assert!(fp.tempo_bpm > 0.0);
        assert!(fp.spectral_centroid >= 0.0 && fp.spectral_centroid <= 1.0);
        assert!(fp.spectral_flatness >= 0.0 && fp.spectral_flatness <= 1.0);
        assert_eq!(fp.stereo_width, 0.0);
        assert_eq!(fp.phase_correlation, 1.0);
        assert!(fp.is_valid());
    }

    #[test]
    fn test_compute_complete_fingerprint_stereo() {
        let mut audio = Vec::new();
        for _ in 0..48000 {
            audio.push(0.1);
            audio.push(0.05);
        }

        let fp = compute_complete_fingerprint(&audio, 48000, 2).unwrap();
        assert!(fp.stereo_width > 0.0);
        assert!(fp.phase_correlation < 1.0);
    }

    #[test]
    fn test_empty_audio_errors() {
        let result = compute_complete_fingerprint(&[], 48000, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_short_track_falls_back_to_full_track() {
        let audio = vec![0.1; 44100 * 2]; // 2 seconds
        let fp = compute_fingerprint(&audio, 44100, 1, FingerprintStrategy::default()).unwrap();
        assert_eq!(fp.method, "full-track");
    }

    #[test]
    fn test_to_dict_has_25_keys() {
        let fp = AudioFingerprint::neutral("full-track");
        let dict = fp.to_dict();
        assert_eq!(dict.len(), 25);
        assert_eq!(dict.get("sub_bass"), Some(&(1.0f32 / 7.0)));
    }

    #[test]
    fn test_neutral_fingerprint_is_valid_and_fully_degraded() {
        let fp = AudioFingerprint::neutral("sampled");
        assert!(fp.is_valid());
        assert!(fp.degraded.any());
    }
}
