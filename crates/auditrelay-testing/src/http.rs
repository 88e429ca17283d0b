//! Mock collector for dispatch and end-to-end tests.

use std::time::Duration;

use auditrelay_core::EventBatch;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Path the mock collector listens on.
pub const COLLECTOR_PATH: &str = "/audit/webhook/event";

/// Behaviour of the mock collector.
#[derive(Debug, Clone)]
pub enum CollectorResponse {
    /// Respond with the given status immediately.
    Status(u16),
    /// Respond with the given status after a delay.
    Delayed {
        /// HTTP status code
        status: u16,
        /// Time to hold the request before answering
        delay: Duration,
    },
}

impl CollectorResponse {
    fn template(&self) -> ResponseTemplate {
        match *self {
            Self::Status(status) => ResponseTemplate::new(status),
            Self::Delayed { status, delay } => ResponseTemplate::new(status).set_delay(delay),
        }
    }
}

/// HTTP collector stand-in backed by wiremock.
pub struct MockCollector {
    server: MockServer,
}

impl MockCollector {
    /// Starts a collector that accepts every batch with HTTP 200.
    pub async fn start() -> Self {
        Self::start_with(CollectorResponse::Status(200)).await
    }

    /// Starts a collector answering every batch with `response`.
    pub async fn start_with(response: CollectorResponse) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(COLLECTOR_PATH))
            .and(header("content-type", "application/json"))
            .respond_with(response.template())
            .mount(&server)
            .await;

        Self { server }
    }

    /// Starts a collector that holds every request for `delay` before
    /// answering 200.
    pub async fn stalled(delay: Duration) -> Self {
        Self::start_with(CollectorResponse::Delayed { status: 200, delay }).await
    }

    /// Full URL of the collector endpoint.
    pub fn endpoint_url(&self) -> String {
        format!("{}{}", self.server.uri(), COLLECTOR_PATH)
    }

    /// Number of requests received so far, including ones still being held.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map(|requests| requests.len()).unwrap_or_default()
    }

    /// Decodes every batch received so far, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if a request body is not a valid batch.
    pub async fn received_batches(&self) -> Vec<EventBatch> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| {
                serde_json::from_slice(&request.body)
                    .unwrap_or_else(|e| panic!("collector received an invalid batch: {e}"))
            })
            .collect()
    }

    /// Asserts that exactly `expected` requests were received.
    pub async fn assert_request_count(&self, expected: usize) {
        let actual = self.request_count().await;
        assert_eq!(actual, expected, "Expected {expected} requests, received {actual}");
    }
}
