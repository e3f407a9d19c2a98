//! HTTP and WebSocket surfaces over `StreamController`.

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::AuralisError;
use crate::streaming::protocol::StreamMessage;
use crate::AppState;

fn default_preset() -> String {
    "adaptive".to_string()
}
fn default_intensity() -> f32 {
    1.0
}

#[derive(Deserialize)]
pub struct ChunkQuery {
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub enhanced: bool,
}

fn header_u64(v: u64) -> HeaderValue {
    HeaderValue::from_str(&v.to_string()).expect("ascii digits are always a valid header value")
}

/// `GET /api/stream/{track_id}/chunk/{chunk_idx}`
pub async fn chunk_handler(
    State(state): State<Arc<AppState>>,
    Path((track_id, chunk_idx)): Path<(u64, u32)>,
    Query(query): Query<ChunkQuery>,
) -> Result<Response, AuralisError> {
    let started = std::time::Instant::now();
    let (bytes, tier, _) = state
        .controller
        .serve_chunk(track_id, chunk_idx, &query.preset, query.intensity, query.enhanced)
        .await?;
    let latency_ms = started.elapsed().as_millis() as u64;

    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("audio/webm; codecs=opus"));
    headers.insert("x-chunk-index", header_u64(chunk_idx as u64));
    headers.insert("x-cache-tier", HeaderValue::from_static(tier));
    headers.insert("x-latency-ms", header_u64(latency_ms));
    headers.insert("x-enhanced", HeaderValue::from_static(if query.enhanced { "true" } else { "false" }));
    headers.insert(
        "x-preset",
        HeaderValue::from_str(&query.preset).unwrap_or_else(|_| HeaderValue::from_static("adaptive")),
    );
    headers.insert("accept-ranges", HeaderValue::from_static("bytes"));
    headers.insert("cache-control", HeaderValue::from_static("no-cache"));

    Ok((headers, bytes).into_response())
}

/// `GET /api/stream/{track_id}/metadata`
pub async fn metadata_handler(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<u64>,
    Query(query): Query<ChunkQuery>,
) -> Result<Json<serde_json::Value>, AuralisError> {
    let info = state.catalog.lookup(track_id)?;
    let total_chunks = state.controller.total_chunks_for(track_id, &query.preset, query.intensity).await?;

    Ok(Json(json!({
        "track_id": track_id,
        "duration": info.duration_s,
        "sample_rate": 44100,
        "channels": 2,
        "chunk_duration": auralis_dsp::chunk_ops::CHUNK_DURATION_S,
        "total_chunks": total_chunks,
        "mime_type": "audio/webm",
        "codecs": "opus",
        "format_version": "unified-v1.0",
    })))
}

#[cfg(feature = "cache-stats-endpoint")]
pub async fn cache_stats_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.cache.stats();
    Json(json!({
        "tier1": {"bytes": stats.tier1.bytes, "max_bytes": stats.tier1.max_bytes, "entries": stats.tier1.entries, "hits": stats.tier1.hits, "misses": stats.tier1.misses},
        "tier2": {"bytes": stats.tier2.bytes, "max_bytes": stats.tier2.max_bytes, "entries": stats.tier2.entries, "hits": stats.tier2.hits, "misses": stats.tier2.misses},
        "overall": {"hit_rate": stats.overall_hit_rate},
        "tracks": {"in_warm": stats.tracks_in_warm},
    }))
}

#[derive(Deserialize)]
pub struct WsStreamRequest {
    pub track_id: u64,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub enhanced: bool,
}

/// `GET /ws/stream` — the client sends one JSON request frame, the server
/// answers with `audio_stream_start`, one or more `audio_chunk` frames per
/// chunk, then `audio_stream_end` (or a single `audio_stream_error`).
pub async fn ws_stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sender = tokio::sync::Mutex::new(sender);

    let request = match receiver.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str::<WsStreamRequest>(&text),
        Some(Ok(_)) => {
            send_protocol_error(&sender, "first frame must be a JSON text request", "BAD_REQUEST").await;
            return;
        }
        _ => return,
    };

    let request = match request {
        Ok(r) => r,
        Err(e) => {
            send_protocol_error(&sender, &format!("malformed request: {e}"), "BAD_REQUEST").await;
            return;
        }
    };

    state
        .controller
        .run(
            request.track_id,
            &request.preset,
            request.intensity,
            request.enhanced,
            |msg: StreamMessage| {
                let sender = &sender;
                async move {
                    let Ok(text) = serde_json::to_string(&msg) else {
                        return false;
                    };
                    sender.lock().await.send(Message::Text(text)).await.is_ok()
                }
            },
        )
        .await;
}

/// A malformed opening frame has no `track_id` to attach to an
/// `audio_stream_error`; send `0` rather than silently dropping the
/// connection, so the client always gets a typed response.
async fn send_protocol_error(sender: &tokio::sync::Mutex<SplitSink<WebSocket, Message>>, message: &str, code: &'static str) {
    let err = StreamMessage::stream_error(0, message.to_string(), code, None);
    if let Ok(text) = serde_json::to_string(&err) {
        let _ = sender.lock().await.send(Message::Text(text)).await;
    }
}
