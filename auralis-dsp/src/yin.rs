/// YIN Fundamental Frequency Detection
///
/// Autocorrelation-based pitch detection using the YIN algorithm
///
/// Reference:
/// de Cheveigné, Alain & Kawahara, Hideki.
/// "YIN, a fundamental frequency estimator for speech and music."
/// JASA 111, 2002.

const FRAME_LENGTH: usize = 2048;
const HOP_LENGTH: usize = 512;
const TROUGH_THRESHOLD: f64 = 0.1;

/// Detect fundamental frequency using YIN algorithm
///
/// # Arguments
/// * `y` - Audio signal [n_samples]
/// * `sr` - Sample rate (Hz)
/// * `fmin` - Minimum frequency (Hz)
/// * `fmax` - Maximum frequency (Hz)
///
/// # Returns
/// Fundamental frequency estimates [n_frames], 0 for unvoiced frames
pub fn yin(y: &[f64], sr: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    if y.len() < FRAME_LENGTH {
        return Vec::new();
    }

    let n_frames = (y.len() - FRAME_LENGTH) / HOP_LENGTH + 1;
    let mut f0_contour = vec![0.0; n_frames];

    let tau_min = (sr as f64 / fmax).floor().max(1.0) as usize;
    let tau_max = ((sr as f64 / fmin).ceil() as usize).min(FRAME_LENGTH / 2);

    let mut diff = vec![0.0f64; tau_max + 1];
    let mut cmndf = vec![1.0f64; tau_max + 1];

    for frame_idx in 0..n_frames {
        let start = frame_idx * HOP_LENGTH;
        let frame = &y[start..start + FRAME_LENGTH];

        difference_function(frame, tau_max, &mut diff);
        cumulative_mean_normalized_difference(&diff, &mut cmndf);

        if let Some(tau) = absolute_threshold(&cmndf, tau_min, tau_max) {
            let refined_tau = parabolic_interpolation(&cmndf, tau);
            if refined_tau > 0.0 {
                f0_contour[frame_idx] = sr as f64 / refined_tau;
            }
        }
    }

    f0_contour
}

/// Difference function d(tau) = sum_j (x[j] - x[j+tau])^2 for tau in 0..=tau_max
fn difference_function(frame: &[f64], tau_max: usize, diff: &mut [f64]) {
    let w = frame.len();
    diff[0] = 0.0;
    for tau in 1..=tau_max {
        let mut sum = 0.0;
        let limit = w.saturating_sub(tau);
        for j in 0..limit {
            let delta = frame[j] - frame[j + tau];
            sum += delta * delta;
        }
        diff[tau] = sum;
    }
}

/// Cumulative mean normalized difference function (CMNDF)
fn cumulative_mean_normalized_difference(diff: &[f64], cmndf: &mut [f64]) {
    cmndf[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        cmndf[tau] = if running_sum > 0.0 {
            diff[tau] * tau as f64 / running_sum
        } else {
            1.0
        };
    }
}

/// Find the first tau past tau_min whose CMNDF dips below the trough threshold
/// and is a local minimum; fall back to the global minimum in range otherwise.
fn absolute_threshold(cmndf: &[f64], tau_min: usize, tau_max: usize) -> Option<usize> {
    let mut tau = tau_min.max(1);
    while tau < tau_max {
        if cmndf[tau] < TROUGH_THRESHOLD {
            while tau + 1 < tau_max && cmndf[tau + 1] < cmndf[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }

    let mut best_tau = None;
    let mut best_val = f64::MAX;
    for t in tau_min.max(1)..tau_max {
        if cmndf[t] < best_val {
            best_val = cmndf[t];
            best_tau = Some(t);
        }
    }
    best_tau
}

/// Parabolic interpolation around tau using its two neighbors for sub-sample precision
fn parabolic_interpolation(cmndf: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmndf.len() {
        return tau as f64;
    }
    let s0 = cmndf[tau - 1];
    let s1 = cmndf[tau];
    let s2 = cmndf[tau + 1];
    let denom = 2.0 * s1 - s2 - s0;
    if denom.abs() < 1e-12 {
        tau as f64
    } else {
        tau as f64 + (s2 - s0) / (2.0 * denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yin_empty() {
        let f0 = yin(&[], 44100, 50.0, 2000.0);
        assert!(f0.is_empty());
    }

    #[test]
    fn test_yin_frame_count() {
        let audio = vec![0.0; 44100];
        let f0 = yin(&audio, 44100, 50.0, 2000.0);
        assert_eq!(f0.len(), (audio.len() - FRAME_LENGTH) / HOP_LENGTH + 1);
    }

    #[test]
    fn test_yin_detects_sine_tone() {
        let sr = 44100usize;
        let freq = 220.0; // A3
        let n = sr * 2;
        let audio: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sr as f64).sin())
            .collect();

        let f0 = yin(&audio, sr, 50.0, 1000.0);
        let voiced: Vec<f64> = f0.iter().copied().filter(|&v| v > 0.0).collect();
        assert!(!voiced.is_empty());
        let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
        assert!((mean - freq).abs() < 10.0, "mean f0 {} not close to {}", mean, freq);
    }

    #[test]
    fn test_yin_silence_is_unvoiced_or_low_confidence() {
        let audio = vec![0.0; 44100];
        let f0 = yin(&audio, 44100, 50.0, 2000.0);
        assert!(f0.iter().all(|&v| v == 0.0));
    }
}
