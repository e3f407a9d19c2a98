/// Constant-Q Chroma Extraction
///
/// Maps a Constant-Q Transform (logarithmically spaced frequency bins, equal
/// resolution in pitch across octaves) down to a 12-bin chromagram.
///
/// Reference:
/// Brown, Judith C. "Calculation of a constant Q spectral transform."
/// JASA 89, 1991.

use ndarray::Array2;
use std::f64::consts::PI;

const FMIN: f64 = 32.703_195_5; // C1
const BINS_PER_OCTAVE: usize = 36; // 3 bins per semitone
const N_OCTAVES: usize = 7;
const N_BINS: usize = BINS_PER_OCTAVE * N_OCTAVES; // 252
const HOP_LENGTH: usize = 512;
const MAX_WINDOW: usize = 8192;

/// Compute a constant-Q chromagram.
///
/// # Arguments
/// * `y` - Audio signal [n_samples]
/// * `sr` - Sample rate (Hz)
///
/// # Returns
/// 2D array shaped `[12, n_frames]`, each column normalized to sum to 1
/// (or all-zero for frames with no energy).
pub fn chroma_cqt(y: &[f64], sr: usize) -> Array2<f64> {
    if y.is_empty() {
        return Array2::zeros((12, 0));
    }

    let q = 1.0 / (2f64.powf(1.0 / BINS_PER_OCTAVE as f64) - 1.0);

    let bin_freqs: Vec<f64> = (0..N_BINS)
        .map(|k| FMIN * 2f64.powf(k as f64 / BINS_PER_OCTAVE as f64))
        .collect();
    let bin_windows: Vec<usize> = bin_freqs
        .iter()
        .map(|&f| {
            let n = (q * sr as f64 / f).round() as usize;
            n.clamp(4, MAX_WINDOW)
        })
        .collect();

    let max_window = *bin_windows.iter().max().unwrap_or(&MAX_WINDOW);
    if y.len() < max_window {
        return Array2::zeros((12, 0));
    }

    let n_frames = (y.len() - max_window) / HOP_LENGTH + 1;
    let mut chroma = Array2::<f64>::zeros((12, n_frames));

    for frame_idx in 0..n_frames {
        let frame_start = frame_idx * HOP_LENGTH;
        let mut pitch_class_energy = [0.0f64; 12];

        for (k, &freq) in bin_freqs.iter().enumerate() {
            let n = bin_windows[k];
            let center_offset = (max_window - n) / 2;
            let start = frame_start + center_offset;
            if start + n > y.len() {
                continue;
            }

            let mag = single_frequency_magnitude(&y[start..start + n], freq, sr as f64);
            let semitone = (k / (BINS_PER_OCTAVE / 12)) % 12;
            pitch_class_energy[semitone] += mag * mag;
        }

        let total: f64 = pitch_class_energy.iter().sum();
        if total > 0.0 {
            for (c, &e) in pitch_class_energy.iter().enumerate() {
                chroma[[c, frame_idx]] = e / total;
            }
        }
    }

    chroma
}

/// Hann-windowed single-frequency magnitude via direct DFT evaluation,
/// equivalent to a one-bin constant-Q kernel.
fn single_frequency_magnitude(frame: &[f64], freq: f64, sr: f64) -> f64 {
    let n = frame.len();
    if n == 0 {
        return 0.0;
    }
    let omega = 2.0 * PI * freq / sr;
    let mut re = 0.0;
    let mut im = 0.0;
    for (i, &x) in frame.iter().enumerate() {
        let w = 0.5 - 0.5 * (2.0 * PI * i as f64 / (n as f64 - 1.0).max(1.0)).cos();
        let phase = omega * i as f64;
        re += x * w * phase.cos();
        im -= x * w * phase.sin();
    }
    (re * re + im * im).sqrt() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroma_empty() {
        let chroma = chroma_cqt(&[], 44100);
        assert_eq!(chroma.dim(), (12, 0));
    }

    #[test]
    fn test_chroma_shape() {
        let audio = vec![0.0; 44100 * 2];
        let chroma = chroma_cqt(&audio, 44100);
        assert_eq!(chroma.dim().0, 12);
        assert!(chroma.dim().1 > 0);
    }

    #[test]
    fn test_chroma_columns_normalized() {
        let sr = 44100usize;
        let freq = 440.0; // A4
        let n = sr * 2;
        let audio: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect();
        let chroma = chroma_cqt(&audio, sr);
        for col in 0..chroma.dim().1 {
            let sum: f64 = (0..12).map(|c| chroma[[c, col]]).sum();
            assert!(sum < 1e-9 || (sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_chroma_peaks_at_expected_pitch_class() {
        let sr = 44100usize;
        let freq = 440.0; // A4 -> pitch class 9 (A)
        let n = sr * 2;
        let audio: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect();
        let chroma = chroma_cqt(&audio, sr);
        let mid_col = chroma.dim().1 / 2;
        let mut max_class = 0;
        let mut max_val = 0.0;
        for c in 0..12 {
            if chroma[[c, mid_col]] > max_val {
                max_val = chroma[[c, mid_col]];
                max_class = c;
            }
        }
        assert_eq!(max_class, 9);
    }
}
