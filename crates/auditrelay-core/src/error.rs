//! Error types for payload normalization.
//!
//! A payload either yields an event, is skipped because its operation is not
//! recognized, or fails with one of these errors. Skips are not errors and
//! never appear here.

use thiserror::Error;

/// Result type alias for normalization operations.
pub type Result<T> = std::result::Result<T, NormalizationError>;

/// Reasons a payload cannot be turned into a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// Body is not a JSON object.
    #[error("malformed payload: {message}")]
    Malformed {
        /// Parser error or description of the unexpected JSON shape
        message: String,
    },

    /// Required field is absent or has the wrong type.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The `time` field is present but is not an RFC 3339 timestamp.
    #[error("invalid timestamp {value:?}: {message}")]
    InvalidTimestamp {
        /// Raw value received in the payload
        value: String,
        /// Parser error
        message: String,
    },
}

impl NormalizationError {
    /// Creates a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed { message: message.into() }
    }

    /// Creates an invalid timestamp error.
    pub fn invalid_timestamp(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTimestamp { value: value.into(), message: message.into() }
    }

    /// Returns a stable short code for response bodies and log fields.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed_payload",
            Self::MissingField(_) => "missing_field",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
        }
    }
}

impl From<serde_json::Error> for NormalizationError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
