//! Provider webhook intake.
//!
//! Normalizes one payload per request and spawns its dispatch onto the
//! server's task tracker. The response reflects normalization only; the
//! collector's verdict is logged by the backend and never reaches the caller.

use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::atomic::{AtomicU64, Ordering},
};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use auditrelay_core::Normalized;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::error_response;
use crate::server::AppState;

/// Response for an event handed to dispatch.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    /// Always `accepted`
    pub status: &'static str,
    /// Audit ID assigned to the event
    pub audit_id: String,
}

/// Response for a payload whose operation is not relayed.
#[derive(Debug, Serialize)]
pub struct SkippedResponse {
    /// Always `skipped`
    pub status: &'static str,
    /// Operation name found in the payload
    pub operation: String,
}

/// Intake counters.
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the intake counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Payloads normalized and handed to dispatch.
    pub accepted: u64,
    /// Payloads for operations outside the allow-list.
    pub skipped: u64,
    /// Payloads refused as malformed or oversized.
    pub rejected: u64,
}

impl IngestStats {
    /// Copies the counters.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Client address of the request.
///
/// The first `X-Forwarded-For` entry wins when it parses as an IP address,
/// otherwise the TCP peer address is used when the server exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceIp(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for SourceIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_for(&parts.headers) {
            return Ok(Self(Some(ip)));
        }

        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
        Ok(Self(peer))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse().ok())
}

/// Accepts one provider audit payload.
///
/// # Responses
///
/// - 202: event normalized and dispatch started
/// - 200: operation not relayed, nothing dispatched
/// - 400: payload malformed, missing `api.name`, or carrying an invalid `time`
/// - 413: payload larger than the configured limit
#[instrument(
    name = "ingest_webhook",
    skip_all,
    fields(source_ip = source_ip.0.map(|ip| ip.to_string()).unwrap_or_default())
)]
pub async fn ingest_webhook(
    State(state): State<AppState>,
    source_ip: SourceIp,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            IngestStats::bump(&state.ingest.rejected);
            let status = rejection.status();
            warn!(status = %status, limit = state.max_payload_bytes, "Failed to read payload");
            let code =
                if status == StatusCode::PAYLOAD_TOO_LARGE { "payload_too_large" } else { "bad_body" };
            return error_response(status, code, rejection.body_text());
        },
    };

    let event = match state.normalizer.normalize(&body, source_ip.0) {
        Ok(Normalized::Event(event)) => event,
        Ok(Normalized::Skipped { operation }) => {
            IngestStats::bump(&state.ingest.skipped);
            debug!(operation = %operation, "Operation not relayed");
            return (StatusCode::OK, Json(SkippedResponse { status: "skipped", operation }))
                .into_response();
        },
        Err(e) => {
            IngestStats::bump(&state.ingest.rejected);
            warn!(error = %e, code = e.code(), "Rejected payload");
            return error_response(StatusCode::BAD_REQUEST, e.code(), e.to_string());
        },
    };

    let audit_id = event.audit_id.to_string();
    info!(audit_id = %audit_id, operation = %event.object_ref.name, "Accepted audit event");
    IngestStats::bump(&state.ingest.accepted);

    let backend = state.backend.clone();
    state.tasks.spawn(async move {
        // Outcome is logged and counted by the backend.
        let _ = backend.forward(event).await;
    });

    (StatusCode::ACCEPTED, Json(AcceptedResponse { status: "accepted", audit_id })).into_response()
}
