//! Router tests for webhook intake and health reporting.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use auditrelay_api::{create_router, AppState};
use auditrelay_core::{Normalizer, NormalizerConfig};
use auditrelay_dispatch::{Backend, DispatchConfig};
use auditrelay_testing::{CollectorResponse, MockCollector, PayloadBuilder};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn state_for(collector: &MockCollector) -> AppState {
    let config = DispatchConfig { endpoint_url: collector.endpoint_url(), ..Default::default() };
    let backend = Backend::new(config).expect("backend should build");
    let normalizer = Normalizer::new(NormalizerConfig {
        workspace: "minio-0(10.0.0.5)".to_string(),
        ..Default::default()
    });

    AppState::new(normalizer, Arc::new(backend))
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

/// Waits for every spawned dispatch to finish.
async fn drain(state: &AppState) {
    state.tasks.close();
    tokio::time::timeout(Duration::from_secs(5), state.tasks.wait())
        .await
        .expect("dispatches did not finish");
}

#[tokio::test]
async fn accepted_payload_is_relayed() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);
    let app = create_router(state.clone());

    let mut request = post("/webhook", PayloadBuilder::put_object().to_body());
    request.headers_mut().insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    let audit_id = body["audit_id"].as_str().expect("audit_id should be a string").to_string();

    drain(&state).await;

    let batches = collector.received_batches().await;
    assert_eq!(batches.len(), 1);
    let event = &batches[0].items[0];
    assert_eq!(event.audit_id.to_string(), audit_id);
    assert_eq!(event.workspace, "minio-0(10.0.0.5)");
    assert_eq!(event.source_ips, vec!["203.0.113.7".to_string()]);
    assert_eq!(event.user.username, "admin");
    assert_eq!(event.response_status.reason, "uploaded 2024/cat.png to bucket (photos)");
    assert_eq!(event.stage_timestamp, "2024-01-02T03:04:05.123Z");
}

#[tokio::test]
async fn root_path_accepts_webhooks() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    let body = PayloadBuilder::new("DeleteBucket").bucket("logs").to_body();
    let (status, _) = send(create_router(state.clone()), post("/", body)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    drain(&state).await;
    collector.assert_request_count(1).await;
}

#[tokio::test]
async fn unknown_operation_is_skipped() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    let body = PayloadBuilder::new("GetObject").bucket("photos").to_body();
    let (status, body) = send(create_router(state.clone()), post("/webhook", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "skipped", "operation": "GetObject"}));

    drain(&state).await;
    collector.assert_request_count(0).await;
    assert_eq!(state.ingest.snapshot().skipped, 1);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    let (status, body) = send(create_router(state.clone()), post("/webhook", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "malformed_payload");
    assert_eq!(state.ingest.snapshot().rejected, 1);
}

#[tokio::test]
async fn missing_operation_name_is_rejected() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    let body = json!({"api": {"bucket": "photos"}}).to_string();
    let (status, body) = send(create_router(state), post("/webhook", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "missing_field");
}

#[tokio::test]
async fn invalid_time_is_rejected() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    let body = PayloadBuilder::put_object().time("yesterday").to_body();
    let (status, body) = send(create_router(state.clone()), post("/webhook", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_timestamp");

    drain(&state).await;
    collector.assert_request_count(0).await;
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector).with_max_payload_bytes(64);

    let body = PayloadBuilder::put_object().field("padding", json!("x".repeat(256))).to_body();
    let (status, body) = send(create_router(state.clone()), post("/webhook", body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "payload_too_large");
    assert_eq!(state.ingest.snapshot().rejected, 1);
}

#[tokio::test]
async fn collector_failure_does_not_affect_response() {
    let collector = MockCollector::start_with(CollectorResponse::Status(500)).await;
    let state = state_for(&collector);

    let (status, _) =
        send(create_router(state.clone()), post("/webhook", PayloadBuilder::put_object().to_body()))
            .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    drain(&state).await;
    assert_eq!(state.backend.stats().bad_statuses, 1);
}

#[tokio::test]
async fn health_reports_counters() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);

    send(create_router(state.clone()), post("/webhook", PayloadBuilder::put_object().to_body()))
        .await;
    drain(&state).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(create_router(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["dispatch"]["delivered"], 1);
    assert_eq!(body["dispatch"]["available_slots"], 100);
    assert_eq!(body["ingest"]["accepted"], 1);
}

#[tokio::test]
async fn health_is_unavailable_after_close() {
    let collector = MockCollector::start().await;
    let state = state_for(&collector);
    state.backend.close();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(create_router(state), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let collector = MockCollector::start().await;
    let app = create_router(state_for(&collector));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
