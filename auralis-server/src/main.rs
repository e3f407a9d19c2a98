use auralis_server::config::Config;
use auralis_server::streaming::cache::ChunkCache;
use auralis_server::streaming::cache_worker::CacheWorker;
use auralis_server::streaming::catalog::{FileTrackCatalog, TrackCatalog};
use auralis_server::streaming::controller::StreamController;
use auralis_server::{build_router, init_tracing, AppState};
use std::sync::Arc;

/// Registers every audio file directly under `scratch_dir/library` as a
/// track, keyed by its position in a sorted directory listing. A real
/// deployment would back this with a database; this is enough to drive
/// the streaming surface against a local library.
fn register_library(catalog: &FileTrackCatalog, library_dir: &std::path::Path) {
    let Ok(mut entries) = std::fs::read_dir(library_dir).map(|rd| {
        rd.filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect::<Vec<_>>()
    }) else {
        tracing::warn!("library directory {library_dir:?} not readable, starting with an empty catalog");
        return;
    };
    entries.sort();

    for (i, path) in entries.into_iter().enumerate() {
        let track_id = i as u64 + 1;
        match catalog.register(track_id, path.clone()) {
            Ok(()) => tracing::info!("registered track {track_id}: {path:?}"),
            Err(e) => tracing::warn!("skipping {path:?}: {e}"),
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Arc::new(Config::load());
    init_tracing(&config);

    tracing::info!(
        chunk_duration_s = config.chunk_duration_s,
        fingerprint_strategy = %config.fingerprint_strategy,
        bind_addr = %config.bind_addr,
        "starting auralis-server"
    );

    let catalog = Arc::new(FileTrackCatalog::new());
    register_library(&catalog, &config.scratch_dir.join("library"));

    let cache = Arc::new(ChunkCache::new(config.tier1_max_bytes, config.tier2_max_bytes, config.tier2_max_tracks));
    let controller = Arc::new(StreamController::new(
        catalog.clone() as Arc<dyn TrackCatalog>,
        cache.clone(),
        config.clone(),
    ));

    CacheWorker::new(controller.clone(), cache.clone()).spawn();

    let state = Arc::new(AppState {
        catalog: catalog as Arc<dyn TrackCatalog>,
        cache,
        controller,
        config: config.clone(),
    });

    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on {addr}");

    axum::serve(listener, app).await.expect("server error");
}
