//! Admission-controlled dispatch of event batches.
//!
//! A backend owns a counting semaphore and a collector client. Each call to
//! [`Backend::dispatch`] runs one attempt through these states:
//!
//! ```text
//! Pending ──▶ Admitting ──┬──▶ Sending ──┬──▶ Delivered
//!                         │              ├──▶ Rejected        (BadStatus)
//!                         │              ├──▶ TimedOut        (SendTimeout)
//!                         │              └──▶ TransportError  (Transport)
//!                         └──▶ AdmissionTimedOut              (AdmissionTimeout)
//! ```
//!
//! Admission waits at most `admission_timeout`. The send deadline is measured
//! from the start of admission, so waiting for a slot eats into the send
//! budget. The permit is held by value and released on every exit path,
//! including cancellation of the calling future.

use std::time::Duration;

use auditrelay_core::{CanonicalEvent, EventBatch};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::Semaphore,
    time::{timeout, timeout_at, Instant},
};
use tracing::{debug, error, info, instrument};

use crate::{
    client::{duration_ms, ClientConfig, CollectorClient},
    error::{DispatchError, FailureKind, Result},
    stats::{DispatchStats, DispatchStatsSnapshot},
};

/// Configuration for a dispatch backend, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Collector URL receiving `POST` requests.
    pub endpoint_url: String,
    /// Admission capacity: at most this many sends run concurrently.
    pub max_concurrent_sends: usize,
    /// Longest time an attempt may wait for a free slot.
    pub admission_timeout: Duration,
    /// Budget for admission, encoding, and the POST together.
    pub send_timeout: Duration,
    /// Whether to verify the collector's TLS certificate.
    pub verify_tls: bool,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint_url: crate::DEFAULT_ENDPOINT_URL.to_string(),
            max_concurrent_sends: crate::DEFAULT_MAX_CONCURRENT_SENDS,
            admission_timeout: crate::DEFAULT_ADMISSION_TIMEOUT,
            send_timeout: crate::DEFAULT_SEND_TIMEOUT,
            verify_tls: true,
            user_agent: ClientConfig::default().user_agent,
        }
    }
}

impl DispatchConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrent_sends == 0 {
            return Err(DispatchError::configuration("max_concurrent_sends must be greater than 0"));
        }
        if self.max_concurrent_sends > Semaphore::MAX_PERMITS {
            return Err(DispatchError::configuration(format!(
                "max_concurrent_sends cannot exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.admission_timeout.is_zero() {
            return Err(DispatchError::configuration("admission_timeout must be greater than 0"));
        }
        if self.send_timeout.is_zero() {
            return Err(DispatchError::configuration("send_timeout must be greater than 0"));
        }
        Ok(())
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.send_timeout,
            user_agent: self.user_agent.clone(),
            verify_tls: self.verify_tls,
        }
    }
}

/// Report of a delivered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Events carried by the batch.
    pub event_count: usize,
    /// Collector status, `None` when nothing was sent.
    pub status_code: Option<u16>,
    /// Time from the start of admission to the collector's response.
    pub elapsed: Duration,
}

impl Delivered {
    fn empty() -> Self {
        Self { event_count: 0, status_code: None, elapsed: Duration::ZERO }
    }
}

/// Delivers event batches to one collector under bounded concurrency.
///
/// Shared by reference (usually behind an `Arc`); the semaphore and counters
/// are the only mutable state and are safe for concurrent use.
#[derive(Debug)]
pub struct Backend {
    client: CollectorClient,
    gate: Semaphore,
    config: DispatchConfig,
    stats: DispatchStats,
}

impl Backend {
    /// Creates a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` if the capacity or timeouts are
    /// zero, the URL is invalid, or the HTTP client cannot be built.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        let client = CollectorClient::new(&config.endpoint_url, config.client_config())?;

        info!(
            url = %client.url(),
            max_concurrent_sends = config.max_concurrent_sends,
            admission_timeout_ms = duration_ms(config.admission_timeout),
            send_timeout_ms = duration_ms(config.send_timeout),
            verify_tls = config.verify_tls,
            "dispatch backend ready"
        );

        Ok(Self {
            client,
            gate: Semaphore::new(config.max_concurrent_sends),
            config,
            stats: DispatchStats::default(),
        })
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Returns a copy of the dispatch counters.
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot(self.gate.available_permits())
    }

    /// Closes the admission gate. Waiting and future attempts fail with
    /// `DispatchError::Closed`; admitted sends run to completion.
    pub fn close(&self) {
        self.gate.close();
    }

    /// Whether [`Backend::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Wraps a single event in a batch and dispatches it.
    ///
    /// # Errors
    ///
    /// See [`Backend::dispatch`].
    pub async fn forward(&self, event: CanonicalEvent) -> Result<Delivered> {
        self.dispatch(&EventBatch::single(event)).await
    }

    /// Delivers one batch in a single POST.
    ///
    /// An empty batch is a no-op: no slot is taken and nothing is sent.
    /// Failures are terminal. They are logged with the batch's audit IDs and
    /// operation names, counted, and returned; the batch is not retried.
    /// Dropping the returned future before it completes counts the batch as
    /// cancelled and logs it the same way.
    ///
    /// # Errors
    ///
    /// - `AdmissionTimeout` if no slot freed up in time; nothing was sent
    /// - `SendTimeout` if the send deadline passed
    /// - `Transport` for connection failures
    /// - `BadStatus` if the collector answered anything but HTTP 200
    /// - `Serialization` if the batch could not be encoded
    /// - `Closed` if the backend was closed
    #[instrument(name = "dispatch", skip_all, fields(events = batch.len()))]
    pub async fn dispatch(&self, batch: &EventBatch) -> Result<Delivered> {
        if batch.is_empty() {
            debug!("empty batch, nothing to send");
            return Ok(Delivered::empty());
        }

        let watch = CancelWatch { stats: &self.stats, batch };
        let result = self.attempt(batch).await;
        watch.disarm();

        match &result {
            Ok(delivered) => {
                self.stats.record_delivered();
                info!(
                    audit_ids = ?batch.audit_ids(),
                    elapsed_ms = duration_ms(delivered.elapsed),
                    "audit batch delivered"
                );
            },
            Err(e) => {
                self.stats.record_failure(e.kind());
                error!(
                    failure = %e.kind(),
                    error = %e,
                    audit_ids = ?batch.audit_ids(),
                    operations = ?batch.operations(),
                    "audit batch dropped"
                );
            },
        }

        result
    }

    async fn attempt(&self, batch: &EventBatch) -> Result<Delivered> {
        let started = Instant::now();
        let deadline = started + self.config.send_timeout;
        let admission_wait = self.config.admission_timeout.min(self.config.send_timeout);

        let _permit = match timeout(admission_wait, self.gate.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(DispatchError::Closed),
            Err(_elapsed) => {
                return Err(DispatchError::admission_timeout(duration_ms(admission_wait)))
            },
        };
        let _in_flight = self.stats.enter();

        debug!(waited_ms = duration_ms(started.elapsed()), "admission slot acquired");

        let body = serde_json::to_vec(batch)
            .map_err(|e| DispatchError::serialization(e.to_string()))?;

        let response = match timeout_at(deadline, self.client.post(Bytes::from(body))).await {
            Ok(response) => response?,
            Err(_elapsed) => {
                return Err(DispatchError::send_timeout(duration_ms(self.config.send_timeout)))
            },
        };

        if response.status_code != 200 {
            return Err(DispatchError::bad_status(response.status_code, response.body));
        }

        Ok(Delivered {
            event_count: batch.len(),
            status_code: Some(response.status_code),
            elapsed: started.elapsed(),
        })
    }
}

/// Accounts for a batch whose dispatch future is dropped mid-attempt.
struct CancelWatch<'a> {
    stats: &'a DispatchStats,
    batch: &'a EventBatch,
}

impl CancelWatch<'_> {
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for CancelWatch<'_> {
    fn drop(&mut self) {
        self.stats.record_failure(FailureKind::Cancelled);
        error!(
            failure = %FailureKind::Cancelled,
            audit_ids = ?self.batch.audit_ids(),
            operations = ?self.batch.operations(),
            "audit batch dropped"
        );
    }
}
