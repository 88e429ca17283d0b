//! Error types for event dispatch.
//!
//! Every dispatch failure is terminal for its batch: nothing is retried or
//! spooled. Variants stay distinguishable so logs and counters can tell an
//! overloaded relay apart from an unhealthy collector.

use std::fmt;

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Reasons a batch was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No admission slot freed up in time; the batch was dropped unsent.
    #[error("admission timed out after {waited_ms}ms")]
    AdmissionTimeout {
        /// Time spent waiting for a slot in milliseconds
        waited_ms: u64,
    },

    /// The admitted send did not complete before the deadline.
    #[error("send timed out after {timeout_ms}ms")]
    SendTimeout {
        /// Send budget that was exceeded in milliseconds
        timeout_ms: u64,
    },

    /// Connection or protocol level failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying client error
        message: String,
    },

    /// Collector answered with something other than HTTP 200.
    #[error("collector rejected batch: HTTP {status_code}")]
    BadStatus {
        /// HTTP status code returned by the collector
        status_code: u16,
        /// Response body, truncated
        body: String,
    },

    /// Batch could not be encoded.
    #[error("failed to serialize batch: {message}")]
    Serialization {
        /// Encoder error
        message: String,
    },

    /// Invalid backend configuration.
    #[error("invalid dispatch configuration: {message}")]
    Configuration {
        /// Description of the invalid setting
        message: String,
    },

    /// The admission gate was closed during shutdown.
    #[error("dispatch backend is closed")]
    Closed,
}

impl DispatchError {
    /// Creates an admission timeout error.
    pub fn admission_timeout(waited_ms: u64) -> Self {
        Self::AdmissionTimeout { waited_ms }
    }

    /// Creates a send timeout error.
    pub fn send_timeout(timeout_ms: u64) -> Self {
        Self::SendTimeout { timeout_ms }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Creates a bad status error from a collector response.
    pub fn bad_status(status_code: u16, body: impl Into<String>) -> Self {
        Self::BadStatus { status_code, body: body.into() }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Returns the terminal state this error represents.
    pub fn kind(&self) -> FailureKind {
        FailureKind::from(self)
    }
}

/// Terminal failure state of a dispatch attempt, for logs and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No slot within the admission timeout.
    AdmissionTimeout,
    /// Send deadline exceeded.
    SendTimeout,
    /// Connection or protocol failure.
    Transport,
    /// Non-200 response.
    BadStatus,
    /// Encoding failure.
    Serialization,
    /// Backend misconfigured or closed.
    Unavailable,
    /// The dispatching future was dropped before reaching any other state.
    Cancelled,
}

impl FailureKind {
    /// Stable label used in log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AdmissionTimeout => "admission_timeout",
            Self::SendTimeout => "send_timeout",
            Self::Transport => "transport",
            Self::BadStatus => "bad_status",
            Self::Serialization => "serialization",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<&DispatchError> for FailureKind {
    fn from(error: &DispatchError) -> Self {
        match error {
            DispatchError::AdmissionTimeout { .. } => Self::AdmissionTimeout,
            DispatchError::SendTimeout { .. } => Self::SendTimeout,
            DispatchError::Transport { .. } => Self::Transport,
            DispatchError::BadStatus { .. } => Self::BadStatus,
            DispatchError::Serialization { .. } => Self::Serialization,
            DispatchError::Configuration { .. } | DispatchError::Closed => Self::Unavailable,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
