//! Track lookup. `TrackCatalog::lookup` is the one external interface the
//! streaming pipeline needs to locate source audio; everything downstream
//! works from the `TrackInfo` it returns.

use crate::audio::multichannel::decode_file;
use crate::error::AuralisError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub path: PathBuf,
    pub duration_s: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

pub trait TrackCatalog: Send + Sync {
    fn lookup(&self, track_id: u64) -> Result<TrackInfo, AuralisError>;
}

/// Catalog backed by an in-memory `track_id -> path` map, populated at
/// startup from the scratch/library directory. Metadata is probed once on
/// registration and cached; `register` re-probes if the path changes.
pub struct FileTrackCatalog {
    tracks: RwLock<HashMap<u64, TrackInfo>>,
}

impl FileTrackCatalog {
    pub fn new() -> Self {
        Self { tracks: RwLock::new(HashMap::new()) }
    }

    /// Decode just enough of `path` to learn duration/sample_rate/channels
    /// and register it under `track_id`. Full PCM is re-decoded later by
    /// the chunk processor; this call pays that cost once at registration
    /// time rather than twice, since `decode_file` already has the samples.
    pub fn register(&self, track_id: u64, path: PathBuf) -> Result<(), AuralisError> {
        let decoded = decode_file(&path.to_string_lossy()).map_err(|e| AuralisError::DecodeError {
            track_id,
            reason: e.to_string(),
        })?;
        let info = TrackInfo {
            path,
            duration_s: decoded.duration_s(),
            sample_rate: decoded.sample_rate,
            channels: decoded.channels(),
        };
        self.tracks.write().insert(track_id, info);
        Ok(())
    }
}

impl Default for FileTrackCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackCatalog for FileTrackCatalog {
    fn lookup(&self, track_id: u64) -> Result<TrackInfo, AuralisError> {
        self.tracks
            .read()
            .get(&track_id)
            .cloned()
            .ok_or(AuralisError::NotFound { track_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_missing_track_is_not_found() {
        let catalog = FileTrackCatalog::new();
        let err = catalog.lookup(42).unwrap_err();
        assert!(matches!(err, AuralisError::NotFound { track_id: 42 }));
    }
}
