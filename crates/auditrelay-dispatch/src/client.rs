//! HTTP client for posting event batches to the collector.
//!
//! Handles request construction and response capture. Whether a response
//! counts as delivered is decided by the backend.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

/// Longest response body kept for diagnostics.
const MAX_RESPONSE_BODY_SIZE: usize = 1024;

/// Configuration for the collector client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Upper bound on a single request, including reading the response.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            user_agent: concat!("auditrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_tls: true,
        }
    }
}

/// Response captured from the collector.
#[derive(Debug, Clone)]
pub struct CollectorResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body, truncated for diagnostics.
    pub body: String,
    /// Time from sending the request to reading the body.
    pub duration: Duration,
}

/// Pooled HTTP client bound to one collector URL.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    url: reqwest::Url,
    config: ClientConfig,
}

impl CollectorClient {
    /// Creates a client for the given collector URL.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` if the URL does not parse or the
    /// HTTP client cannot be built.
    pub fn new(url: &str, config: ClientConfig) -> Result<Self> {
        let url = reqwest::Url::parse(url).map_err(|e| {
            DispatchError::configuration(format!("invalid collector URL {url:?}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DispatchError::configuration(format!(
                "unsupported collector URL scheme: {}",
                url.scheme()
            )));
        }

        if !config.verify_tls {
            warn!(url = %url, "TLS certificate verification disabled for collector");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| {
                DispatchError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, url, config })
    }

    /// Collector URL this client posts to.
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// Posts an encoded batch as `application/json`.
    ///
    /// # Errors
    ///
    /// - `SendTimeout` if the client timeout elapses
    /// - `Transport` for connection and protocol failures
    ///
    /// Non-success statuses are returned as responses, not errors.
    pub async fn post(&self, body: Bytes) -> Result<CollectorResponse> {
        let start_time = Instant::now();

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.categorize(e))?;

        let collector_response = read_response(response, start_time).await;

        debug!(
            status = collector_response.status_code,
            duration_ms = collector_response.duration.as_millis(),
            "collector responded"
        );

        Ok(collector_response)
    }

    fn categorize(&self, error: reqwest::Error) -> DispatchError {
        if error.is_timeout() {
            return DispatchError::send_timeout(duration_ms(self.config.timeout));
        }
        if error.is_connect() {
            return DispatchError::transport(format!("connection failed: {error}"));
        }
        DispatchError::transport(error.to_string())
    }
}

async fn read_response(mut response: Response, start_time: Instant) -> CollectorResponse {
    let status_code = response.status().as_u16();

    let body = match read_capped(&mut response, MAX_RESPONSE_BODY_SIZE).await {
        Ok((bytes, false)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok((bytes, true)) => format!("{}... (truncated)", String::from_utf8_lossy(&bytes)),
        Err(e) => {
            warn!("Failed to read collector response body: {}", e);
            format!("[Failed to read response body: {e}]")
        },
    };

    CollectorResponse { status_code, body, duration: start_time.elapsed() }
}

/// Reads at most `limit` body bytes chunk by chunk. The flag is set when the
/// body had more to give; the rest is never buffered.
async fn read_capped(response: &mut Response, limit: usize) -> reqwest::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok((buf, false))
}

/// Saturating conversion for log fields and error payloads.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
