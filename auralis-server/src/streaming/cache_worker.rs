//! Background agent that fills Warm with chunks ahead of the current
//! playhead once a stream reports a position. Never affects a live
//! stream's own correctness if it fails: errors are logged and dropped.

use crate::streaming::cache::{ChunkCache, ChunkKey, Variant};
use crate::streaming::controller::StreamController;
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_millis(1000);
const ACTIVE_POLL: Duration = Duration::from_millis(250);

pub struct CacheWorker {
    controller: Arc<StreamController>,
    cache: Arc<ChunkCache>,
}

impl CacheWorker {
    pub fn new(controller: Arc<StreamController>, cache: Arc<ChunkCache>) -> Self {
        Self { controller, cache }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        loop {
            let sleep_for = match self.cache.active_track() {
                Some((track_id, chunk_index, preset, intensity)) => {
                    self.fill_next(track_id, chunk_index, &preset, intensity).await;
                    ACTIVE_POLL
                }
                None => IDLE_POLL,
            };
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Rate-limited to at most one in-flight chunk per tick: render the
    /// next not-yet-cached chunk after the playhead, nothing more.
    async fn fill_next(&self, track_id: u64, chunk_index: u32, preset: &str, intensity: f32) {
        let total_chunks = match self.controller.total_chunks_for(track_id, preset, intensity).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("cache worker: could not size track {track_id}: {e}");
                return;
            }
        };

        let next = chunk_index + 1;
        if next >= total_chunks {
            return;
        }

        let key = ChunkKey::new(track_id, preset, intensity, next, Variant::Processed);
        if self.cache.lookup(&key).is_some() {
            return;
        }

        match self.controller.render_chunk(track_id, next, preset, intensity).await {
            Ok(bytes) => self.cache.warm_immediately(track_id, next, preset, intensity, bytes),
            Err(e) => tracing::debug!("cache worker: failed to pre-render track {track_id} chunk {next}: {e}"),
        }
    }
}
