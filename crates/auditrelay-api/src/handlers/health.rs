//! Health endpoint for service monitoring.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use auditrelay_dispatch::DispatchStatsSnapshot;
use serde::Serialize;
use tracing::instrument;

use super::IngestStatsSnapshot;
use crate::server::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Service version information
    pub version: &'static str,
    /// Dispatch counters
    pub dispatch: DispatchStatsSnapshot,
    /// Intake counters
    pub ingest: IngestStatsSnapshot,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting and dispatching events
    Healthy,
    /// Dispatch gate closed, shutting down
    Unhealthy,
}

/// Reports liveness together with the intake and dispatch counters.
///
/// Answers 503 once the dispatch backend has been closed.
#[instrument(name = "health_check", skip_all)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let (status, code) = if state.backend.is_closed() {
        (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE)
    } else {
        (HealthStatus::Healthy, StatusCode::OK)
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        dispatch: state.backend.stats(),
        ingest: state.ingest.snapshot(),
    };

    (code, Json(response)).into_response()
}
