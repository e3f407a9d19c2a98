// Parameter Mapper
// Derives a mastering parameter set from a 25D fingerprint
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use crate::fingerprint_compute::AudioFingerprint;
use crate::graphic_eq::{HARD_MAX_DB, NOMINAL_MAX_DB};

pub const MAPPER_VERSION: &str = "auralis-mapper-1";

/// Named bias applied to an assembled parameter set. Interpretation lives
/// entirely in [`apply_preset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Adaptive,
    Gentle,
    Warm,
    Bright,
    Punchy,
}

impl Preset {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "adaptive" => Some(Preset::Adaptive),
            "gentle" => Some(Preset::Gentle),
            "warm" => Some(Preset::Warm),
            "bright" => Some(Preset::Bright),
            "punchy" => Some(Preset::Punchy),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Adaptive => "adaptive",
            Preset::Gentle => "gentle",
            Preset::Warm => "warm",
            Preset::Bright => "bright",
            Preset::Punchy => "punchy",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompressorParams {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub makeup_gain_db: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MultibandCompressorParams {
    pub low: CompressorParams,
    pub mid: CompressorParams,
    pub high: CompressorParams,
}

#[derive(Debug, Clone, Copy)]
pub struct LevelParams {
    pub target_lufs: f64,
    pub gain_db: f64,
    pub headroom_db: f64,
    pub safety_margin_db: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct HarmonicParams {
    pub saturation_enabled: bool,
    pub saturation_amount: f64,
    pub exciter_enabled: bool,
    pub exciter_amount: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct MasteringParameters {
    pub eq_gains_db: [f64; 31],
    pub compressor: CompressorParams,
    pub multiband: MultibandCompressorParams,
    pub level: LevelParams,
    pub harmonic: HarmonicParams,
    pub mapper_version: &'static str,
    pub fingerprint_method: &'static str,
}

/// One row of the declarative band-to-dimension table: which contiguous
/// range of the 31 EQ bands a frequency fingerprint dimension drives, and
/// the dB range a `[0,1]` energy percentage maps onto.
struct BandRow {
    band_start: usize,
    band_end: usize, // exclusive
    range_db: (f64, f64),
}

const BAND_TABLE: [BandRow; 7] = [
    BandRow { band_start: 0, band_end: 3, range_db: (-4.0, 4.0) },   // sub_bass: 20/25/31.5
    BandRow { band_start: 3, band_end: 7, range_db: (-5.0, 5.0) },   // bass: 40/50/63/80
    BandRow { band_start: 7, band_end: 11, range_db: (-4.0, 4.0) },  // low_mid: 100/125/160/200
    BandRow { band_start: 11, band_end: 17, range_db: (-3.0, 3.0) }, // mid: 250..800
    BandRow { band_start: 17, band_end: 21, range_db: (-4.0, 4.0) }, // upper_mid: 1000..2000
    BandRow { band_start: 21, band_end: 25, range_db: (-5.0, 5.0) }, // presence: 2500..5000
    BandRow { band_start: 25, band_end: 31, range_db: (-6.0, 6.0) }, // air: 6300..20000
];

fn linear_map(percent: f32, range: (f64, f64)) -> f64 {
    let p = (percent as f64).clamp(0.0, 1.0);
    range.0 + p * (range.1 - range.0)
}

/// `EqMapper`: band-normalization table + spectral-centroid/rolloff/flatness
/// overlay + saturation.
fn map_eq(fp: &AudioFingerprint) -> [f64; 31] {
    let mut gains = [0.0f64; 31];
    let percents = [fp.sub_bass, fp.bass, fp.low_mid, fp.mid, fp.upper_mid, fp.presence, fp.air];

    for (row, &percent) in BAND_TABLE.iter().zip(percents.iter()) {
        let gain = linear_map(percent, row.range_db);
        for band in row.band_start..row.band_end {
            gains[band] = gain;
        }
    }

    // Spectral-centroid-dependent overlay, weight 0.5.
    const OVERLAY_WEIGHT: f64 = 0.5;
    if fp.spectral_centroid > 0.375 {
        for band in [19, 20] {
            gains[band] -= 2.0 * OVERLAY_WEIGHT;
        }
    } else if fp.spectral_centroid < 0.1875 {
        for band in [22, 23] {
            gains[band] += 3.0 * OVERLAY_WEIGHT;
        }
    }

    if fp.spectral_rolloff > 1.0 {
        for band in 28..31 {
            gains[band] -= 3.0 * OVERLAY_WEIGHT;
        }
    } else if fp.spectral_rolloff < 0.5 {
        for band in 28..31 {
            gains[band] += 4.0 * OVERLAY_WEIGHT;
        }
    }

    if fp.spectral_flatness > 0.6 {
        for band in [7, 11, 14] {
            gains[band] -= 1.5 * OVERLAY_WEIGHT;
        }
    }

    for gain in gains.iter_mut() {
        *gain = saturate(*gain);
    }

    gains
}

fn saturate(g: f64) -> f64 {
    let sign = g.signum();
    let mag = g.abs();
    if mag <= NOMINAL_MAX_DB {
        g
    } else if mag < HARD_MAX_DB {
        let span = HARD_MAX_DB - NOMINAL_MAX_DB;
        sign * (NOMINAL_MAX_DB + span * (1.0 - (-(mag - NOMINAL_MAX_DB) / span).exp()))
    } else {
        sign * HARD_MAX_DB
    }
}

/// `DynamicsMapper`: single-band compressor + three-band variant.
fn map_dynamics(fp: &AudioFingerprint) -> (CompressorParams, MultibandCompressorParams) {
    let crest = fp.crest_db as f64;

    let ratio = if crest < 6.0 {
        2.0
    } else if crest <= 10.0 {
        2.0 + (crest - 6.0) / 4.0 * 2.0
    } else {
        (4.0 + ((crest - 10.0) / 10.0).min(1.0) * 2.0).min(6.0)
    };

    let threshold_db = fp.lufs as f64 + crest / 2.0;
    let attack_ms = (5.0f64).max(50.0 - 2.0 * crest);
    let release_ms = (100.0 + 100.0 * fp.bass_mid_ratio as f64).clamp(50.0, 500.0);
    let makeup_gain_db = crest / 2.0;

    let single = CompressorParams {
        threshold_db,
        ratio,
        attack_ms,
        release_ms,
        makeup_gain_db,
    };

    let variation = fp.dynamic_range_variation as f64;
    let low = CompressorParams {
        threshold_db: threshold_db - 2.0 * fp.bass as f64,
        ratio: (ratio + fp.bass as f64 * 2.0).min(6.0),
        attack_ms,
        release_ms,
        makeup_gain_db,
    };
    let mid = CompressorParams {
        threshold_db: threshold_db - variation,
        ratio,
        attack_ms,
        release_ms,
        makeup_gain_db,
    };
    let high = CompressorParams {
        threshold_db: threshold_db + 2.0 * fp.air as f64,
        ratio: (ratio - fp.air as f64).max(1.5),
        attack_ms,
        release_ms,
        makeup_gain_db,
    };

    (single, MultibandCompressorParams { low, mid, high })
}

/// `LevelMapper`.
fn map_level(fp: &AudioFingerprint, target_lufs: f64) -> LevelParams {
    let gain_db = target_lufs - fp.lufs as f64;
    let headroom_db = fp.crest_db as f64 / 2.0 + fp.loudness_variation as f64;
    LevelParams {
        target_lufs,
        gain_db,
        headroom_db,
        safety_margin_db: 1.0,
    }
}

/// `HarmonicMapper`.
fn map_harmonic(fp: &AudioFingerprint) -> HarmonicParams {
    let harmonic_ratio = fp.harmonic_ratio as f64;
    let pitch_stability = fp.pitch_stability as f64;
    let chroma_energy = fp.chroma_energy as f64;

    let saturation_enabled = harmonic_ratio > 0.7 && pitch_stability > 0.8;
    let saturation_amount = if saturation_enabled {
        (0.3f64).min(chroma_energy / 2.0)
    } else {
        0.0
    };

    let exciter_enabled = harmonic_ratio < 0.4;
    let exciter_amount = if exciter_enabled {
        (0.5 - harmonic_ratio) * 0.5
    } else {
        0.0
    };

    HarmonicParams {
        saturation_enabled,
        saturation_amount,
        exciter_enabled,
        exciter_amount,
        enabled: harmonic_ratio > 0.5,
    }
}

fn shelf_band_indices(below_hz: f64) -> Vec<usize> {
    crate::graphic_eq::ISO_BAND_CENTERS
        .iter()
        .enumerate()
        .filter(|(_, &f)| f < below_hz)
        .map(|(i, _)| i)
        .collect()
}

fn above_band_indices(above_hz: f64) -> Vec<usize> {
    crate::graphic_eq::ISO_BAND_CENTERS
        .iter()
        .enumerate()
        .filter(|(_, &f)| f > above_hz)
        .map(|(i, _)| i)
        .collect()
}

/// Apply a named preset's bias to an already-assembled parameter set.
fn apply_preset(mut params: MasteringParameters, preset: Preset) -> MasteringParameters {
    match preset {
        Preset::Adaptive => {}
        Preset::Gentle => {
            for g in params.eq_gains_db.iter_mut() {
                *g *= 0.6;
            }
            params.compressor.ratio = 1.0 + (params.compressor.ratio - 1.0) * 0.6;
            params.level.headroom_db += 1.0;
        }
        Preset::Warm => {
            for band in shelf_band_indices(250.0) {
                params.eq_gains_db[band] += 1.5;
            }
            for band in above_band_indices(8000.0) {
                params.eq_gains_db[band] -= 1.0;
            }
        }
        Preset::Bright => {
            for band in shelf_band_indices(250.0) {
                params.eq_gains_db[band] -= 1.5;
            }
            for band in above_band_indices(8000.0) {
                params.eq_gains_db[band] += 1.0;
            }
        }
        Preset::Punchy => {
            params.compressor.ratio = (params.compressor.ratio + 1.0).min(6.0);
            params.compressor.attack_ms = (params.compressor.attack_ms * 0.8).max(5.0);
        }
    }

    for g in params.eq_gains_db.iter_mut() {
        *g = saturate(*g);
    }

    params
}

/// Scale every delta-from-neutral (EQ gains, compressor ratio's distance from
/// 1:1, harmonic amounts) by `intensity`. `intensity=0` reproduces the
/// unmastered signal's parameters; `intensity=1` is full strength.
fn apply_intensity(mut params: MasteringParameters, intensity: f64) -> MasteringParameters {
    let intensity = intensity.clamp(0.0, 1.0);

    for g in params.eq_gains_db.iter_mut() {
        *g *= intensity;
    }

    params.compressor.ratio = 1.0 + (params.compressor.ratio - 1.0) * intensity;
    for band in [&mut params.multiband.low, &mut params.multiband.mid, &mut params.multiband.high] {
        band.ratio = 1.0 + (band.ratio - 1.0) * intensity;
    }

    params.harmonic.saturation_amount *= intensity;
    params.harmonic.exciter_amount *= intensity;

    params
}

/// Assemble a full mastering parameter set from a fingerprint, preset name,
/// and intensity in `[0,1]`.
pub fn map_parameters(fp: &AudioFingerprint, preset_name: &str, intensity: f64, target_lufs: f64) -> MasteringParameters {
    let preset = Preset::parse(preset_name).unwrap_or(Preset::Adaptive);

    let eq_gains_db = map_eq(fp);
    let (compressor, multiband) = map_dynamics(fp);
    let level = map_level(fp, target_lufs);
    let harmonic = map_harmonic(fp);

    let assembled = MasteringParameters {
        eq_gains_db,
        compressor,
        multiband,
        level,
        harmonic,
        mapper_version: MAPPER_VERSION,
        fingerprint_method: fp.method,
    };

    let biased = apply_preset(assembled, preset);
    apply_intensity(biased, intensity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint_compute::AudioFingerprint;

    fn flat_fingerprint() -> AudioFingerprint {
        AudioFingerprint::neutral("full-track")
    }

    #[test]
    fn test_neutral_fingerprint_yields_bounded_eq() {
        let fp = flat_fingerprint();
        let params = map_parameters(&fp, "adaptive", 1.0, -14.0);
        for g in params.eq_gains_db.iter() {
            assert!(g.abs() <= HARD_MAX_DB + 1e-9);
        }
    }

    #[test]
    fn test_intensity_zero_is_neutral() {
        let fp = flat_fingerprint();
        let params = map_parameters(&fp, "punchy", 0.0, -14.0);
        for g in params.eq_gains_db.iter() {
            assert!(g.abs() < 1e-9);
        }
        assert!((params.compressor.ratio - 1.0).abs() < 1e-9);
        assert_eq!(params.harmonic.saturation_amount, 0.0);
    }

    #[test]
    fn test_gentle_scales_down_eq() {
        let fp = flat_fingerprint();
        let adaptive = map_parameters(&fp, "adaptive", 1.0, -14.0);
        let gentle = map_parameters(&fp, "gentle", 1.0, -14.0);
        let adaptive_max = adaptive.eq_gains_db.iter().cloned().fold(0.0f64, |a, b| a.max(b.abs()));
        let gentle_max = gentle.eq_gains_db.iter().cloned().fold(0.0f64, |a, b| a.max(b.abs()));
        assert!(gentle_max <= adaptive_max + 1e-9);
    }

    #[test]
    fn test_punchy_increases_ratio_and_caps_at_six() {
        let mut fp = flat_fingerprint();
        fp.crest_db = 20.0;
        let params = map_parameters(&fp, "punchy", 1.0, -14.0);
        assert!(params.compressor.ratio <= 6.0);
    }

    #[test]
    fn test_harmonic_saturation_engages_on_strong_harmonic_content() {
        let mut fp = flat_fingerprint();
        fp.harmonic_ratio = 0.9;
        fp.pitch_stability = 0.9;
        fp.chroma_energy = 0.8;
        let params = map_parameters(&fp, "adaptive", 1.0, -14.0);
        assert!(params.harmonic.saturation_enabled);
        assert!(params.harmonic.saturation_amount > 0.0);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_adaptive() {
        let fp = flat_fingerprint();
        let a = map_parameters(&fp, "adaptive", 1.0, -14.0);
        let b = map_parameters(&fp, "not-a-real-preset", 1.0, -14.0);
        assert_eq!(a.eq_gains_db, b.eq_gains_db);
    }
}
