pub mod analysis;
pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod models;
pub mod opus;
pub mod streaming;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use config::Config;
use streaming::cache::ChunkCache;
use streaming::catalog::TrackCatalog;
use streaming::controller::StreamController;

/// Shared state reachable from every handler: the track catalog, the
/// two-tier chunk cache, the controller that drives both transports, and
/// the resolved configuration.
pub struct AppState {
    pub catalog: Arc<dyn TrackCatalog>,
    pub cache: Arc<ChunkCache>,
    pub controller: Arc<StreamController>,
    pub config: Arc<Config>,
}

/// Assemble the full route table over a given state. Split out from
/// `main` so integration tests can drive it in-process with
/// `tower::ServiceExt::oneshot` instead of binding a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/health", get(api::health::health_handler))
        .route("/fingerprint", post(api::fingerprint::fingerprint_handler))
        .route("/ws/stream", get(api::stream::ws_stream_handler))
        .route("/api/stream/:track_id/chunk/:chunk_idx", get(api::stream::chunk_handler))
        .route("/api/stream/:track_id/metadata", get(api::stream::metadata_handler));

    #[cfg(feature = "cache-stats-endpoint")]
    {
        app = app.route("/api/stream/cache/stats", get(api::stream::cache_stats_handler));
    }

    app.layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
