//! Core audit event model and payload normalization.
//!
//! Provides the canonical audit record forwarded to the collector, the
//! normalizer that turns provider-emitted storage audit payloads into that
//! record, and the clock abstraction used to stamp events. The dispatch and
//! API crates depend on these types for a single, consistent wire schema.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod model;
pub mod normalize;
pub mod time;

pub use error::{NormalizationError, Result};
pub use model::{
    AuditId, CanonicalEvent, EventBatch, ObjectRef, Operation, ResponseStatus, UserInfo,
};
pub use normalize::{Normalized, Normalizer, NormalizerConfig};
pub use time::{Clock, RealClock, TestClock};
