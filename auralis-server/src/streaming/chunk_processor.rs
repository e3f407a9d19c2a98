//! Per-track stateful chunk production. Decodes the source once at
//! construction, derives mastering parameters from its fingerprint, then
//! renders chunks on demand through a single `MasteringProcessor` whose
//! filter/compressor state persists across calls — the single hardest
//! constraint in this pipeline, since each chunk is produced with a 5 s
//! context margin that gets discarded at the edges.

use crate::audio::multichannel::decode_file;
use crate::error::AuralisError;
use crate::streaming::catalog::TrackInfo;
use auralis_dsp::chunk_ops::{self, PcmBuffer, WaveformSource};
use auralis_dsp::{compute_fingerprint, map_parameters, FingerprintStrategy, MasteringProcessor};
use ndarray::{s, Array2};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct InMemoryWaveform {
    pcm: Array2<f64>,
    sample_rate: u32,
}

impl WaveformSource for InMemoryWaveform {
    fn channels(&self) -> usize {
        self.pcm.shape()[0]
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_span(&self, start_s: f64, end_s: f64) -> Array2<f64> {
        let total_frames = self.pcm.shape()[1];
        let start = ((start_s * self.sample_rate as f64).round() as usize).min(total_frames);
        let end = ((end_s * self.sample_rate as f64).round() as usize).min(total_frames);
        if end <= start {
            return Array2::zeros((self.channels(), 0));
        }
        self.pcm.slice(s![.., start..end]).to_owned()
    }
}

struct State {
    mastering: MasteringProcessor,
    last_index: Option<u32>,
}

pub struct StreamChunkProcessor {
    track_id: u64,
    preset: String,
    intensity: f32,
    sample_rate: u32,
    channels: u16,
    total_duration_s: f64,
    total_chunks: usize,
    waveform: InMemoryWaveform,
    scratch_dir: PathBuf,
    state: Mutex<State>,
    pub fingerprint_method: &'static str,
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), AuralisError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AuralisError::CacheIo { reason: format!("mkdir {parent:?}: {e}") })?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| AuralisError::CacheIo { reason: format!("write {tmp:?}: {e}") })?;
    std::fs::rename(&tmp, path).map_err(|e| AuralisError::CacheIo { reason: format!("rename {tmp:?}: {e}") })?;
    Ok(())
}

fn to_channel_vecs(pcm: &PcmBuffer) -> Vec<Vec<f32>> {
    (0..pcm.channels())
        .map(|ch| pcm.data.index_axis(ndarray::Axis(0), ch).iter().map(|&v| v as f32).collect())
        .collect()
}

impl StreamChunkProcessor {
    pub fn new(
        track_id: u64,
        info: &TrackInfo,
        preset: &str,
        intensity: f32,
        strategy: FingerprintStrategy,
        target_lufs: f64,
        scratch_dir: PathBuf,
    ) -> Result<Self, AuralisError> {
        let decoded = decode_file(&info.path.to_string_lossy())
            .map_err(|e| AuralisError::DecodeError { track_id, reason: e.to_string() })?;

        let interleaved: Vec<f32> = interleave_f32(&decoded.pcm);
        let fp = compute_fingerprint(&interleaved, decoded.sample_rate, decoded.channels() as u32, strategy)
            .unwrap_or_else(|_| auralis_dsp::AudioFingerprint::neutral("degraded"));
        let method = fp.method;

        let params = map_parameters(&fp, preset, intensity as f64, target_lufs);
        let mastering = MasteringProcessor::new(params, decoded.sample_rate as f64, decoded.channels() as usize, true);

        let total_duration_s = decoded.duration_s();
        let total_chunks = chunk_ops::total_chunks(total_duration_s);

        Ok(Self {
            track_id,
            preset: preset.to_string(),
            intensity,
            sample_rate: decoded.sample_rate,
            channels: decoded.channels(),
            total_duration_s,
            total_chunks,
            waveform: InMemoryWaveform { pcm: decoded.pcm, sample_rate: decoded.sample_rate },
            scratch_dir,
            state: Mutex::new(State { mastering, last_index: None }),
            fingerprint_method: method,
        })
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn total_duration_s(&self) -> f64 {
        self.total_duration_s
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn blob_path(&self, chunk_index: u32) -> PathBuf {
        self.scratch_dir
            .join("chunks")
            .join(self.track_id.to_string())
            .join(format!("{}_{}", self.preset, (self.intensity * 10.0).round() as u8))
            .join(format!("{chunk_index:06}.webm"))
    }

    /// Synchronous core; callers dispatch through `spawn_blocking`.
    fn chunk_sync(&self, i: u32, fast_start: bool) -> Result<PathBuf, AuralisError> {
        let path = self.blob_path(i);
        if path.exists() {
            return Ok(path);
        }

        let mut state = self.state.lock();

        let mut j = state.last_index.map(|l| l + 1).unwrap_or(0);
        while j < i {
            let window = chunk_ops::load_window(&self.waveform, j as usize, true, self.total_duration_s);
            let _ = state.mastering.process(&window, true);
            j += 1;
        }

        let window = chunk_ops::load_window(&self.waveform, i as usize, true, self.total_duration_s);
        let out = state.mastering.process(&window, fast_start);
        let segment = chunk_ops::extract_segment(&out.pcm, i as usize, self.total_chunks, self.total_duration_s, self.sample_rate);

        let channel_vecs = to_channel_vecs(&segment);
        let bytes = crate::opus::encode(&channel_vecs, self.sample_rate)?;
        atomic_write(&path, &bytes)?;

        state.last_index = Some(i);
        Ok(path)
    }

    /// Render chunk `i`, wrapping any failure so the caller can surface a
    /// single `audio_stream_error` and terminate. Idempotent: calling twice
    /// for the same `i` returns the same bytes on disk.
    pub async fn process_chunk_safe(self: &Arc<Self>, i: u32, fast_start: bool) -> Result<PathBuf, AuralisError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.chunk_sync(i, fast_start))
            .await
            .map_err(|e| AuralisError::Internal { reason: format!("chunk task join error: {e}") })?
    }
}

/// Interleave a `(channels, frames)` block into the flat, frame-major layout
/// `compute_fingerprint` expects for stereo input (`L0 R0 L1 R1 ...`); for
/// mono it's just the samples in order.
fn interleave_f32(pcm: &Array2<f64>) -> Vec<f32> {
    let channels = pcm.shape()[0].max(1);
    let frames = pcm.shape()[1];
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for c in 0..channels {
            out.push(pcm[[c, i]] as f32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_stereo_order() {
        let pcm = Array2::from_shape_vec((2, 2), vec![1.0, -1.0, 2.0, -2.0]).unwrap();
        let interleaved = interleave_f32(&pcm);
        assert_eq!(interleaved, vec![1.0, 2.0, -1.0, -2.0]);
    }
}
