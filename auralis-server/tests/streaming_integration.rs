//! Drives the streaming lifecycle end to end against a synthetic sine-wave
//! track, through the real `StreamController` and in-process router rather
//! than a bound socket.

use auralis_server::config::Config;
use auralis_server::streaming::cache::ChunkCache;
use auralis_server::streaming::catalog::{FileTrackCatalog, TrackCatalog};
use auralis_server::streaming::controller::StreamController;
use auralis_server::streaming::protocol::StreamMessage;
use auralis_server::{build_router, AppState};
use axum::body::Body;
use axum::http::Request;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

/// Writes a mono 16-bit PCM WAV: a `seconds`-long 440 Hz sine at
/// `sample_rate`. No external WAV-writing crate is in the dependency
/// stack, and the header is a fixed 44 bytes, so it's written by hand.
fn write_sine_wav(path: &std::path::Path, seconds: f64, sample_rate: u32) {
    let frames = (seconds * sample_rate as f64).round() as u32;
    let data_bytes = frames * 2;
    let mut f = std::fs::File::create(path).unwrap();

    f.write_all(b"RIFF").unwrap();
    f.write_all(&(36 + data_bytes).to_le_bytes()).unwrap();
    f.write_all(b"WAVE").unwrap();
    f.write_all(b"fmt ").unwrap();
    f.write_all(&16u32.to_le_bytes()).unwrap();
    f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
    f.write_all(&1u16.to_le_bytes()).unwrap(); // mono
    f.write_all(&sample_rate.to_le_bytes()).unwrap();
    f.write_all(&(sample_rate * 2).to_le_bytes()).unwrap(); // byte rate
    f.write_all(&2u16.to_le_bytes()).unwrap(); // block align
    f.write_all(&16u16.to_le_bytes()).unwrap(); // bits per sample
    f.write_all(b"data").unwrap();
    f.write_all(&data_bytes.to_le_bytes()).unwrap();

    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let sample = (t * 440.0 * std::f64::consts::TAU).sin() * 0.5;
        f.write_all(&((sample * i16::MAX as f64) as i16).to_le_bytes()).unwrap();
    }
}

fn test_state(track_path: &std::path::Path) -> Arc<AppState> {
    let config = Arc::new(Config {
        chunk_duration_s: 15.0,
        chunk_interval_s: 10.0,
        fingerprint_strategy: "sampling".to_string(),
        sampling_interval_s: 20.0,
        tier1_max_bytes: 64 * 1024 * 1024,
        tier2_max_bytes: 64 * 1024 * 1024,
        tier2_max_tracks: 2,
        opus_bitrate_kbps: 192,
        eq_nominal_max_db: 12.0,
        eq_hard_max_db: 18.0,
        target_lufs: -16.0,
        bind_addr: "127.0.0.1:0".to_string(),
        scratch_dir: std::env::temp_dir().join(format!("auralis-test-{}-{}", std::process::id(), fastrand_like())),
        log_format: "plain".to_string(),
        blocking_threads: None,
    });

    let catalog = Arc::new(FileTrackCatalog::new());
    catalog.register(1, track_path.to_path_buf()).expect("register test track");

    let cache = Arc::new(ChunkCache::new(config.tier1_max_bytes, config.tier2_max_bytes, config.tier2_max_tracks));
    let controller = Arc::new(StreamController::new(catalog.clone() as Arc<dyn TrackCatalog>, cache.clone(), config.clone()));

    Arc::new(AppState { catalog: catalog as Arc<dyn TrackCatalog>, cache, controller, config })
}

#[tokio::test]
async fn metadata_endpoint_reports_expected_chunk_count() {
    let dir = tempdir();
    let wav = dir.join("track.wav");
    write_sine_wav(&wav, 25.0, 44100);

    let state = test_state(&wav);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/api/stream/1/metadata").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // 25s at a 10s chunk interval: chunks start at 0s/10s/20s => 3 chunks
    // (total_chunks = ceil(duration / chunk_interval_s)).
    assert_eq!(json["total_chunks"], 3);
    assert_eq!(json["sample_rate"], 44100);
    assert_eq!(json["codecs"], "opus");
}

#[tokio::test]
async fn metadata_endpoint_404s_for_unknown_track() {
    let dir = tempdir();
    let wav = dir.join("track.wav");
    write_sine_wav(&wav, 16.0, 44100);

    let state = test_state(&wav);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/api/stream/999/metadata").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chunk_lifecycle_produces_all_chunks_then_cache_hits_on_replay() {
    let dir = tempdir();
    let wav = dir.join("track.wav");
    write_sine_wav(&wav, 25.0, 44100);

    let state = test_state(&wav);

    let mut messages = Vec::new();
    state
        .controller
        .run(1, "adaptive", 1.0, false, |msg: StreamMessage| {
            messages.push(msg);
            async { true }
        })
        .await;

    assert!(matches!(messages.first(), Some(StreamMessage::Start(_))));
    assert!(matches!(messages.last(), Some(StreamMessage::End(_))));
    let chunk_frames: Vec<_> = messages
        .iter()
        .filter_map(|m| if let StreamMessage::Chunk(c) = m { Some(c) } else { None })
        .collect();
    let distinct_chunks: std::collections::HashSet<u32> = chunk_frames.iter().map(|c| c.chunk_index).collect();
    assert_eq!(distinct_chunks.len(), 3);

    // Re-request chunk 0 over HTTP; it should now be a cache hit.
    let app = build_router(state.clone());
    let response = app
        .oneshot(Request::builder().uri("/api/stream/1/chunk/0?preset=adaptive&intensity=1.0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let tier = response.headers().get("x-cache-tier").unwrap().to_str().unwrap().to_string();
    assert!(tier == "tier1" || tier == "tier2", "expected a cache hit, got tier={tier}");
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("auralis-wav-{}-{}", std::process::id(), fastrand_like()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Per-call counter so concurrently-run tests in this file don't collide
/// on the same temp directory; not worth a real RNG dependency.
fn fastrand_like() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
