//! Best-effort delivery of audit event batches to a webhook collector.
//!
//! This crate implements the sending half of the relay: a backend that admits
//! at most a fixed number of concurrent sends, posts each batch once, and
//! drops it on any failure.
//!
//! # Delivery semantics
//!
//! - **Bounded admission** - a counting semaphore caps in-flight sends; an
//!   attempt that cannot get a slot within the admission timeout is dropped
//!   instead of queued
//! - **Shared deadline** - slot wait and network time share one send budget
//! - **Best effort** - success means HTTP 200; everything else is logged with
//!   the batch's audit IDs and discarded, never retried
//!
//! # Example
//!
//! ```no_run
//! use auditrelay_core::EventBatch;
//! use auditrelay_dispatch::{Backend, DispatchConfig, DispatchError};
//!
//! # async fn example(batch: EventBatch) -> std::result::Result<(), DispatchError> {
//! let config = DispatchConfig {
//!     endpoint_url: "https://collector.example.com/audit/webhook/event".to_string(),
//!     ..DispatchConfig::default()
//! };
//! let backend = Backend::new(config)?;
//!
//! backend.dispatch(&batch).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod backend;
pub mod client;
pub mod error;
pub mod stats;

pub use backend::{Backend, Delivered, DispatchConfig};
pub use error::{DispatchError, FailureKind, Result};
pub use stats::DispatchStatsSnapshot;

/// Default collector URL.
pub const DEFAULT_ENDPOINT_URL: &str = "https://127.0.0.1:30278/audit/webhook/event";

/// Default admission capacity.
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 100;

/// Default longest wait for an admission slot.
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(1);

/// Default budget for admission plus the POST.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);
