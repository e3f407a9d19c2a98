//! Three-layer configuration: compiled-in defaults, `auralis.toml` on disk,
//! then `AURALIS_*` env vars / CLI flags, lowest precedence first. CLI
//! parsing and the env layer are both handled by clap's derive API with the
//! `env` feature, so every flag doubles as an environment variable
//! (`--chunk-duration-s` / `AURALIS_CHUNK_DURATION_S`) without a second
//! struct for that part. `Raw` fields are all `Option` so we can tell
//! "nothing was passed" apart from "the default was passed explicitly",
//! which lets an `auralis.toml` value win over a compiled-in default
//! without ever outranking something the user actually typed.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "auralis-server", version)]
struct Raw {
    #[arg(long, env = "AURALIS_CHUNK_DURATION_S")]
    chunk_duration_s: Option<f64>,
    #[arg(long, env = "AURALIS_CHUNK_INTERVAL_S")]
    chunk_interval_s: Option<f64>,
    #[arg(long, env = "AURALIS_FINGERPRINT_STRATEGY")]
    fingerprint_strategy: Option<String>,
    #[arg(long, env = "AURALIS_SAMPLING_INTERVAL_S")]
    sampling_interval_s: Option<f32>,
    #[arg(long, env = "AURALIS_TIER1_MAX_BYTES")]
    tier1_max_bytes: Option<u64>,
    #[arg(long, env = "AURALIS_TIER2_MAX_BYTES")]
    tier2_max_bytes: Option<u64>,
    #[arg(long, env = "AURALIS_TIER2_MAX_TRACKS")]
    tier2_max_tracks: Option<usize>,
    #[arg(long, env = "AURALIS_OPUS_BITRATE_KBPS")]
    opus_bitrate_kbps: Option<u32>,
    #[arg(long, env = "AURALIS_EQ_NOMINAL_MAX_DB")]
    eq_nominal_max_db: Option<f64>,
    #[arg(long, env = "AURALIS_EQ_HARD_MAX_DB")]
    eq_hard_max_db: Option<f64>,
    #[arg(long, env = "AURALIS_TARGET_LUFS")]
    target_lufs: Option<f64>,
    #[arg(long, env = "AURALIS_BIND_ADDR")]
    bind_addr: Option<String>,
    #[arg(long, env = "AURALIS_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
    #[arg(long, env = "AURALIS_LOG_FORMAT")]
    log_format: Option<String>,
    #[arg(long, env = "AURALIS_BLOCKING_THREADS")]
    blocking_threads: Option<usize>,
    /// Path to the TOML config file, itself overridable.
    #[arg(long, env = "AURALIS_CONFIG_FILE", default_value = "auralis.toml")]
    config_file: PathBuf,
}

/// Deserialized shape of `auralis.toml`; every field optional so a file can
/// set only the fields it cares about.
#[derive(Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    chunk_duration_s: Option<f64>,
    chunk_interval_s: Option<f64>,
    fingerprint_strategy: Option<String>,
    sampling_interval_s: Option<f32>,
    tier1_max_bytes: Option<u64>,
    tier2_max_bytes: Option<u64>,
    tier2_max_tracks: Option<usize>,
    opus_bitrate_kbps: Option<u32>,
    eq_nominal_max_db: Option<f64>,
    eq_hard_max_db: Option<f64>,
    target_lufs: Option<f64>,
    bind_addr: Option<String>,
    scratch_dir: Option<PathBuf>,
    log_format: Option<String>,
    blocking_threads: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chunk_duration_s: f64,
    pub chunk_interval_s: f64,
    pub fingerprint_strategy: String,
    pub sampling_interval_s: f32,
    pub tier1_max_bytes: u64,
    pub tier2_max_bytes: u64,
    pub tier2_max_tracks: usize,
    pub opus_bitrate_kbps: u32,
    pub eq_nominal_max_db: f64,
    pub eq_hard_max_db: f64,
    pub target_lufs: f64,
    pub bind_addr: String,
    pub scratch_dir: PathBuf,
    pub log_format: String,
    pub blocking_threads: Option<usize>,
}

macro_rules! layer {
    ($cli:expr, $file:expr, $default:expr) => {
        $cli.or($file).unwrap_or($default)
    };
}

impl Config {
    /// Resolve the three layers and validate cross-field invariants.
    pub fn load() -> Self {
        let raw = Raw::parse();
        let file = std::fs::read_to_string(&raw.config_file)
            .ok()
            .and_then(|text| toml::from_str::<FileConfig>(&text).ok())
            .unwrap_or_default();

        let config = Config {
            chunk_duration_s: layer!(raw.chunk_duration_s, file.chunk_duration_s, 15.0),
            chunk_interval_s: layer!(raw.chunk_interval_s, file.chunk_interval_s, 10.0),
            fingerprint_strategy: layer!(raw.fingerprint_strategy, file.fingerprint_strategy, "sampling".to_string()),
            sampling_interval_s: layer!(raw.sampling_interval_s, file.sampling_interval_s, 20.0),
            tier1_max_bytes: layer!(raw.tier1_max_bytes, file.tier1_max_bytes, 12 * 1024 * 1024),
            tier2_max_bytes: layer!(raw.tier2_max_bytes, file.tier2_max_bytes, 240 * 1024 * 1024),
            tier2_max_tracks: layer!(raw.tier2_max_tracks, file.tier2_max_tracks, 2),
            opus_bitrate_kbps: layer!(raw.opus_bitrate_kbps, file.opus_bitrate_kbps, 192),
            eq_nominal_max_db: layer!(raw.eq_nominal_max_db, file.eq_nominal_max_db, 12.0),
            eq_hard_max_db: layer!(raw.eq_hard_max_db, file.eq_hard_max_db, 18.0),
            target_lufs: layer!(raw.target_lufs, file.target_lufs, -16.0),
            bind_addr: layer!(raw.bind_addr, file.bind_addr, "127.0.0.1:8766".to_string()),
            scratch_dir: layer!(raw.scratch_dir, file.scratch_dir, PathBuf::from("./scratch")),
            log_format: layer!(raw.log_format, file.log_format, "plain".to_string()),
            blocking_threads: raw.blocking_threads.or(file.blocking_threads),
        };
        config.validate();
        config
    }

    /// Panics on contract violations; these can only be wrong at startup,
    /// never mid-stream, so a panic here is the correct failure mode.
    pub fn validate(&self) {
        assert!(
            self.chunk_interval_s < self.chunk_duration_s,
            "chunk_interval_s ({}) must be < chunk_duration_s ({})",
            self.chunk_interval_s,
            self.chunk_duration_s
        );
        assert!(
            self.eq_nominal_max_db < self.eq_hard_max_db,
            "eq_nominal_max_db ({}) must be < eq_hard_max_db ({})",
            self.eq_nominal_max_db,
            self.eq_hard_max_db
        );
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr.parse().expect("invalid bind_addr")
    }

    pub fn fingerprint_strategy(&self) -> auralis_dsp::FingerprintStrategy {
        match self.fingerprint_strategy.as_str() {
            "full-track" => auralis_dsp::FingerprintStrategy::FullTrack,
            _ => auralis_dsp::FingerprintStrategy::Sampling { interval_s: self.sampling_interval_s },
        }
    }
}
