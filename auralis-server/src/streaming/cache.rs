//! Two-tier chunk cache. Hot holds the handful of chunks around the
//! playhead for the active track; Warm holds a bounded number of whole
//! tracks' worth of chunks so a preset switch or rewind doesn't have to
//! re-render from scratch. Single mutex guards both tiers; blobs are
//! refcounted so a lookup's handle stays valid after the lock is released,
//! even if the entry is evicted moments later.

use crate::error::AuralisError;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Original,
    Processed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub track_id: u64,
    pub preset: String,
    pub intensity_tenths: u8,
    pub chunk_index: u32,
    pub original: bool,
}

impl ChunkKey {
    pub fn new(track_id: u64, preset: &str, intensity: f32, chunk_index: u32, variant: Variant) -> Self {
        Self {
            track_id,
            preset: preset.to_string(),
            intensity_tenths: (intensity * 10.0).round().clamp(0.0, 255.0) as u8,
            chunk_index,
            original: variant == Variant::Original,
        }
    }
}

pub type BlobHandle = Arc<Vec<u8>>;

#[derive(Debug, Clone, Copy)]
pub enum TierHint {
    Auto,
    Hot,
    Warm,
}

struct Entry {
    blob: BlobHandle,
    inserted: Instant,
}

struct Tier {
    entries: LruCache<ChunkKey, Entry>,
    max_bytes: u64,
    bytes: u64,
    hits: u64,
    misses: u64,
}

impl Tier {
    fn new(max_bytes: u64) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(usize::MAX).unwrap()),
            max_bytes,
            bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn lookup(&mut self, key: &ChunkKey) -> Option<BlobHandle> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.blob.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Evict least-recently-used entries until `extra_bytes` fits within
    /// `max_bytes`. Returns false if even a fully empty tier couldn't hold
    /// it (the blob itself exceeds the budget).
    fn make_room(&mut self, extra_bytes: u64) -> bool {
        if extra_bytes > self.max_bytes {
            return false;
        }
        while self.bytes + extra_bytes > self.max_bytes {
            match self.entries.pop_lru() {
                Some((_, entry)) => self.bytes = self.bytes.saturating_sub(entry.blob.len() as u64),
                None => return false,
            }
        }
        true
    }

    fn insert(&mut self, key: ChunkKey, blob: BlobHandle, name: &'static str) -> Result<(), AuralisError> {
        let size = blob.len() as u64;
        if !self.make_room(size) {
            return Err(AuralisError::BudgetExceeded { tier: name });
        }
        if let Some(old) = self.entries.put(key, Entry { blob, inserted: Instant::now() }) {
            self.bytes = self.bytes.saturating_sub(old.blob.len() as u64);
        }
        self.bytes += size;
        Ok(())
    }

    fn remove_track(&mut self, track_id: u64, processed_only: bool) {
        let victims: Vec<ChunkKey> = self
            .entries
            .iter()
            .filter(|(k, _)| k.track_id == track_id && (!processed_only || !k.original))
            .map(|(k, _)| k.clone())
            .collect();
        for k in victims {
            if let Some(entry) = self.entries.pop(&k) {
                self.bytes = self.bytes.saturating_sub(entry.blob.len() as u64);
            }
        }
    }

    fn distinct_tracks(&self) -> std::collections::HashSet<u64> {
        self.entries.iter().map(|(k, _)| k.track_id).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TierStats {
    pub bytes: u64,
    pub max_bytes: u64,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub tier1: TierStats,
    pub tier2: TierStats,
    pub overall_hit_rate: f64,
    pub tracks_in_warm: usize,
}

struct Position {
    chunk_index: u32,
    preset: String,
    intensity: f32,
}

pub struct ChunkCache {
    hot: Mutex<Tier>,
    warm: Mutex<Tier>,
    tier2_max_tracks: usize,
    active: Mutex<Option<(u64, Position)>>,
}

impl ChunkCache {
    pub fn new(tier1_max_bytes: u64, tier2_max_bytes: u64, tier2_max_tracks: usize) -> Self {
        Self {
            hot: Mutex::new(Tier::new(tier1_max_bytes)),
            warm: Mutex::new(Tier::new(tier2_max_bytes)),
            tier2_max_tracks: tier2_max_tracks.max(1),
            active: Mutex::new(None),
        }
    }

    /// `tier1` first (it holds the current playhead's chunks), falling
    /// through to `tier2`. Either hit promotes the entry's recency.
    pub fn lookup(&self, key: &ChunkKey) -> Option<(BlobHandle, &'static str)> {
        if let Some(blob) = self.hot.lock().lookup(key) {
            return Some((blob, "tier1"));
        }
        if let Some(blob) = self.warm.lock().lookup(key) {
            return Some((blob, "tier2"));
        }
        None
    }

    /// `TierHint::Auto` puts the chunk in Hot if it belongs to the
    /// currently-active track, Warm otherwise.
    pub fn insert(&self, key: ChunkKey, blob: Vec<u8>, tier: TierHint) -> Result<(), AuralisError> {
        let blob: BlobHandle = Arc::new(blob);
        let resolved = match tier {
            TierHint::Hot => TierHint::Hot,
            TierHint::Warm => TierHint::Warm,
            TierHint::Auto => {
                let is_active = self
                    .active
                    .lock()
                    .as_ref()
                    .map(|(id, _)| *id == key.track_id)
                    .unwrap_or(false);
                if is_active {
                    TierHint::Hot
                } else {
                    TierHint::Warm
                }
            }
        };

        match resolved {
            TierHint::Hot => self.hot.lock().insert(key, blob, "hot"),
            _ => {
                self.enforce_track_budget(key.track_id);
                self.warm.lock().insert(key, blob, "warm")
            }
        }
    }

    fn enforce_track_budget(&self, incoming_track: u64) {
        let mut warm = self.warm.lock();
        loop {
            let tracks = warm.distinct_tracks();
            if tracks.len() < self.tier2_max_tracks || tracks.contains(&incoming_track) {
                break;
            }
            let active_track = self.active.lock().as_ref().map(|(id, _)| *id);
            let victim = tracks
                .iter()
                .copied()
                .find(|t| Some(*t) != active_track && *t != incoming_track);
            match victim {
                Some(t) => warm.remove_track(t, false),
                None => break,
            }
        }
    }

    /// Report the playhead moving. Changing tracks invalidates Hot (it only
    /// ever holds the active track's chunks); changing preset (same track)
    /// evicts processed Warm entries for this track but keeps originals.
    pub fn update_position(&self, track_id: u64, position_s: f64, preset: &str, intensity: f32, chunk_duration_s: f64) {
        let chunk_index = (position_s / chunk_duration_s.max(0.001)).floor().max(0.0) as u32;
        let mut active = self.active.lock();

        let track_changed = active.as_ref().map(|(id, _)| *id != track_id).unwrap_or(true);
        let preset_changed = active
            .as_ref()
            .map(|(id, pos)| *id == track_id && (pos.preset != preset || (pos.intensity - intensity).abs() > 1e-6))
            .unwrap_or(false);

        if track_changed {
            let mut hot = self.hot.lock();
            hot.entries.clear();
            hot.bytes = 0;
        }
        if preset_changed {
            self.warm.lock().remove_track(track_id, true);
        }

        *active = Some((track_id, Position { chunk_index, preset: preset.to_string(), intensity }));
    }

    /// Immediately place already-rendered chunks into Warm (used by the
    /// background cache worker, not the live stream path).
    pub fn warm_immediately(&self, track_id: u64, chunk_index: u32, preset: &str, intensity: f32, blob: Vec<u8>) {
        let key = ChunkKey::new(track_id, preset, intensity, chunk_index, Variant::Processed);
        let _ = self.insert(key, blob, TierHint::Warm);
    }

    /// Current `(track_id, chunk_index, preset, intensity)`, if any stream
    /// has reported a position since the cache was created or the track
    /// last changed. Used by the background cache worker to know what to
    /// pre-render next.
    pub fn active_track(&self) -> Option<(u64, u32, String, f32)> {
        self.active
            .lock()
            .as_ref()
            .map(|(id, pos)| (*id, pos.chunk_index, pos.preset.clone(), pos.intensity))
    }

    pub fn is_fully_cached(&self, track_id: u64, preset: &str, intensity: f32, total_chunks: u32) -> bool {
        let warm = self.warm.lock();
        let hot = self.hot.lock();
        (0..total_chunks).all(|i| {
            let key = ChunkKey::new(track_id, preset, intensity, i, Variant::Processed);
            warm.entries.contains(&key) || hot.entries.contains(&key)
        })
    }

    pub fn stats(&self) -> CacheStats {
        let hot = self.hot.lock();
        let warm = self.warm.lock();
        let total_hits = hot.hits + warm.hits;
        let total_lookups = total_hits + hot.misses + warm.misses;
        CacheStats {
            tier1: TierStats { bytes: hot.bytes, max_bytes: hot.max_bytes, entries: hot.entries.len(), hits: hot.hits, misses: hot.misses },
            tier2: TierStats { bytes: warm.bytes, max_bytes: warm.max_bytes, entries: warm.entries.len(), hits: warm.hits, misses: warm.misses },
            overall_hit_rate: if total_lookups == 0 { 0.0 } else { total_hits as f64 / total_lookups as f64 },
            tracks_in_warm: warm.distinct_tracks().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ChunkCache {
        ChunkCache::new(1024, 4096, 2)
    }

    #[test]
    fn test_insert_then_lookup_hits() {
        let cache = cache();
        let key = ChunkKey::new(1, "adaptive", 1.0, 0, Variant::Processed);
        cache.insert(key.clone(), vec![1, 2, 3], TierHint::Warm).unwrap();
        let (blob, tier) = cache.lookup(&key).unwrap();
        assert_eq!(*blob, vec![1, 2, 3]);
        assert_eq!(tier, "tier2");
    }

    #[test]
    fn test_distinct_keys_on_preset_change() {
        let a = ChunkKey::new(1, "adaptive", 1.0, 0, Variant::Processed);
        let b = ChunkKey::new(1, "warm", 1.0, 0, Variant::Processed);
        assert_ne!(a, b);
    }

    #[test]
    fn test_tier2_track_budget_enforced() {
        let cache = cache();
        for track in 0..5u64 {
            let key = ChunkKey::new(track, "adaptive", 1.0, 0, Variant::Processed);
            let _ = cache.insert(key, vec![0u8; 64], TierHint::Warm);
        }
        assert!(cache.stats().tracks_in_warm <= 2);
    }

    #[test]
    fn test_budget_exceeded_when_blob_too_large() {
        let cache = cache();
        let key = ChunkKey::new(1, "adaptive", 1.0, 0, Variant::Processed);
        let err = cache.insert(key, vec![0u8; 10_000], TierHint::Warm).unwrap_err();
        assert!(matches!(err, AuralisError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_preset_change_evicts_processed_but_keeps_original() {
        let cache = cache();
        let original = ChunkKey::new(1, "adaptive", 1.0, 0, Variant::Original);
        let processed = ChunkKey::new(1, "adaptive", 1.0, 0, Variant::Processed);
        cache.insert(original.clone(), vec![1], TierHint::Warm).unwrap();
        cache.insert(processed.clone(), vec![2], TierHint::Warm).unwrap();

        cache.update_position(1, 0.0, "adaptive", 1.0, 15.0);
        cache.update_position(1, 0.0, "warm", 1.0, 15.0);

        assert!(cache.lookup(&original).is_some());
        assert!(cache.lookup(&processed).is_none());
    }
}
