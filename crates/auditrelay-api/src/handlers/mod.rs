//! HTTP request handlers for the audit relay.
//!
//! - `ingest` - provider webhook intake
//! - `health` - liveness with dispatch counters
//!
//! Error bodies share one shape: `{"error":{"code","message"}}`.

pub mod health;
pub mod ingest;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub use health::health_check;
pub use ingest::{ingest_webhook, IngestStats, IngestStatsSnapshot};

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Builds a JSON error response.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail { code: code.to_string(), message: message.into() },
    };

    (status, Json(body)).into_response()
}
