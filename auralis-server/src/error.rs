use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::streaming::protocol::StreamMessage;

/// Legacy fingerprint-endpoint error type, kept for the `/fingerprint` route.
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Audio file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    DecodingError(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Analysis failed: {0}")]
    AnalysisError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for FingerprintError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            FingerprintError::FileNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            FingerprintError::UnsupportedFormat(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            FingerprintError::DecodingError(msg) => (StatusCode::BAD_REQUEST, msg),
            FingerprintError::InvalidAudio(msg) => (StatusCode::BAD_REQUEST, msg),
            FingerprintError::AnalysisError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            FingerprintError::IoError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            FingerprintError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FingerprintError>;

/// Error taxonomy for the streaming pipeline. DSP-level degradation
/// (analyzer/mastering) never appears here; it is recorded as a degraded
/// bit instead, per `auralis_dsp::DegradedBits` and `ProcessOutput::degraded`.
#[derive(Error, Debug, Clone)]
pub enum AuralisError {
    #[error("track {track_id} not found")]
    NotFound { track_id: u64 },

    #[error("failed to decode track {track_id}: {reason}")]
    DecodeError { track_id: u64, reason: String },

    #[error("opus encode failed: {reason}")]
    EncodeError { reason: String },

    #[error("cache tier {tier} exceeded with nothing evictable")]
    BudgetExceeded { tier: &'static str },

    #[error("cache I/O failed: {reason}")]
    CacheIo { reason: String },

    #[error("transport closed")]
    TransportClosed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal precondition violated: {reason}")]
    Internal { reason: String },
}

impl AuralisError {
    fn code(&self) -> &'static str {
        match self {
            AuralisError::NotFound { .. } => "TRACK_NOT_FOUND",
            AuralisError::DecodeError { .. } => "DECODE_ERROR",
            AuralisError::EncodeError { .. } => "ENCODE_ERROR",
            AuralisError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            AuralisError::CacheIo { .. } => "CACHE_IO",
            AuralisError::TransportClosed => "TRANSPORT_CLOSED",
            AuralisError::Cancelled => "CANCELLED",
            AuralisError::Internal { .. } => "INTERNAL",
        }
    }

    /// Convert to the single WebSocket error surfacing point. `chunk` is
    /// `None` when the failure happened before any chunk was attempted
    /// (e.g. track lookup).
    pub fn to_stream_error(&self, track_id: u64, chunk: Option<u32>) -> StreamMessage {
        StreamMessage::stream_error(track_id, self.to_string(), self.code(), chunk)
    }
}

impl IntoResponse for AuralisError {
    fn into_response(self) -> Response {
        let status = match self {
            AuralisError::NotFound { .. } => StatusCode::NOT_FOUND,
            AuralisError::BudgetExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            AuralisError::DecodeError { .. }
            | AuralisError::EncodeError { .. }
            | AuralisError::Internal { .. }
            | AuralisError::CacheIo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AuralisError::TransportClosed | AuralisError::Cancelled => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

pub type AResult<T> = std::result::Result<T, AuralisError>;
