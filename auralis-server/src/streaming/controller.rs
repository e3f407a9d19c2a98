//! Orchestrates one request end to end: track lookup, processor
//! construction/reuse, the per-chunk cache-or-render loop, and the single
//! error-surfacing point shared by both transports (WebSocket frames and
//! the HTTP chunk/metadata endpoints).

use crate::config::Config;
use crate::error::AuralisError;
use crate::streaming::cache::{ChunkCache, ChunkKey, TierHint, Variant};
use crate::streaming::catalog::TrackCatalog;
use crate::streaming::chunk_processor::StreamChunkProcessor;
use crate::streaming::protocol::StreamMessage;
use auralis_dsp::chunk_ops::OVERLAP_S;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

pub struct StreamController {
    catalog: Arc<dyn TrackCatalog>,
    cache: Arc<ChunkCache>,
    config: Arc<Config>,
    processors: AsyncMutex<HashMap<(u64, String, u8), Arc<StreamChunkProcessor>>>,
}

fn intensity_key(intensity: f32) -> u8 {
    (intensity * 10.0).round().clamp(0.0, 255.0) as u8
}

impl StreamController {
    pub fn new(catalog: Arc<dyn TrackCatalog>, cache: Arc<ChunkCache>, config: Arc<Config>) -> Self {
        Self { catalog, cache, config, processors: AsyncMutex::new(HashMap::new()) }
    }

    async fn get_or_create_processor(
        &self,
        track_id: u64,
        preset: &str,
        intensity: f32,
    ) -> Result<Arc<StreamChunkProcessor>, AuralisError> {
        let key = (track_id, preset.to_string(), intensity_key(intensity));
        let mut processors = self.processors.lock().await;
        if let Some(p) = processors.get(&key) {
            return Ok(Arc::clone(p));
        }

        let info = self.catalog.lookup(track_id)?;
        let strategy = self.config.fingerprint_strategy();
        let processor = tokio::task::spawn_blocking({
            let preset = preset.to_string();
            let scratch = self.config.scratch_dir.clone();
            let target_lufs = self.config.target_lufs;
            move || StreamChunkProcessor::new(track_id, &info, &preset, intensity, strategy, target_lufs, scratch)
        })
        .await
        .map_err(|e| AuralisError::Internal { reason: format!("processor construction join error: {e}") })??;

        let processor = Arc::new(processor);
        processors.insert(key, Arc::clone(&processor));
        Ok(processor)
    }

    /// Used by the background cache worker to learn a track's chunk count
    /// without going through the full streaming lifecycle.
    pub async fn total_chunks_for(&self, track_id: u64, preset: &str, intensity: f32) -> Result<u32, AuralisError> {
        let processor = self.get_or_create_processor(track_id, preset, intensity).await?;
        Ok(processor.total_chunks() as u32)
    }

    /// Render a chunk's bytes without touching the cache or the active
    /// playhead. Used by the background cache worker, which inserts the
    /// result into Warm itself via `ChunkCache::warm_immediately` — unlike
    /// `serve_chunk`, this never reports a position, so it can't be mistaken
    /// for live playback progress.
    pub async fn render_chunk(&self, track_id: u64, chunk_index: u32, preset: &str, intensity: f32) -> Result<Vec<u8>, AuralisError> {
        let processor = self.get_or_create_processor(track_id, preset, intensity).await?;
        let path = processor.process_chunk_safe(chunk_index, false).await?;
        tokio::fs::read(&path).await.map_err(|e| AuralisError::CacheIo { reason: format!("read {path:?}: {e}") })
    }

    /// Shared entry point for both the WebSocket loop and the HTTP chunk
    /// endpoint: cache-read, render-on-miss, cache-write, and a
    /// `X-Cache-Tier`/latency measurement either way.
    pub async fn serve_chunk(
        &self,
        track_id: u64,
        chunk_index: u32,
        preset: &str,
        intensity: f32,
        _enhanced: bool,
    ) -> Result<(Vec<u8>, &'static str, u64), AuralisError> {
        let started = Instant::now();
        let key = ChunkKey::new(track_id, preset, intensity, chunk_index, Variant::Processed);

        if let Some((blob, tier)) = self.cache.lookup(&key) {
            return Ok((blob.as_ref().clone(), tier, started.elapsed().as_millis() as u64));
        }

        let processor = self.get_or_create_processor(track_id, preset, intensity).await?;
        let fast_start = chunk_index == 0;
        let path = processor.process_chunk_safe(chunk_index, fast_start).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AuralisError::CacheIo { reason: format!("read {path:?}: {e}") })?;

        self.cache.update_position(
            track_id,
            chunk_index as f64 * auralis_dsp::chunk_ops::CHUNK_INTERVAL_S,
            preset,
            intensity,
            auralis_dsp::chunk_ops::CHUNK_DURATION_S,
        );
        let _ = self.cache.insert(key, bytes.clone(), TierHint::Auto);

        Ok((bytes, "miss", started.elapsed().as_millis() as u64))
    }

    /// Drive the full lifecycle over a generic sender; `send` returns `Err`
    /// once the transport is gone, which is treated as cooperative
    /// cancellation, not an error to surface.
    pub async fn run<F, Fut>(&self, track_id: u64, preset: &str, intensity: f32, enhanced: bool, mut send: F)
    where
        F: FnMut(StreamMessage) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let info = match self.catalog.lookup(track_id) {
            Ok(info) => info,
            Err(e) => {
                send(e.to_stream_error(track_id, None)).await;
                return;
            }
        };

        let processor = match self.get_or_create_processor(track_id, preset, intensity).await {
            Ok(p) => p,
            Err(e) => {
                send(e.to_stream_error(track_id, None)).await;
                return;
            }
        };

        let total_chunks = processor.total_chunks() as u32;
        let start_msg = StreamMessage::start(
            track_id,
            preset,
            intensity,
            info.sample_rate,
            info.channels,
            total_chunks,
            processor.total_duration_s() as f32,
        );
        if !send(start_msg).await {
            return;
        }

        let mut total_samples: u64 = 0;
        let overlap_frames = (OVERLAP_S * processor.sample_rate() as f64).round() as u32;

        for chunk_index in 0..total_chunks {
            let (bytes, _tier, _latency) = match self.serve_chunk(track_id, chunk_index, preset, intensity, enhanced).await {
                Ok(r) => r,
                Err(e) => {
                    send(e.to_stream_error(track_id, Some(chunk_index))).await;
                    return;
                }
            };

            let sample_count = estimate_sample_count(chunk_index, total_chunks, processor.total_duration_s(), processor.sample_rate());
            total_samples += sample_count as u64;
            let crossfade_samples = if chunk_index == 0 { 0 } else { overlap_frames };

            for frame in StreamMessage::chunk_frames(chunk_index, total_chunks, &bytes, sample_count, crossfade_samples) {
                if !send(frame).await {
                    return;
                }
            }
        }

        send(StreamMessage::end(track_id, total_samples, processor.total_duration_s() as f32)).await;
    }
}

fn estimate_sample_count(chunk_index: u32, total_chunks: u32, total_duration_s: f64, sr: u32) -> u32 {
    let interval = auralis_dsp::chunk_ops::CHUNK_INTERVAL_S;
    if chunk_index + 1 < total_chunks {
        (interval * sr as f64).round() as u32
    } else {
        let remaining = (total_duration_s - chunk_index as f64 * interval).max(0.0);
        (remaining * sr as f64).round() as u32
    }
}
