//! Normalization of provider audit payloads into canonical events.
//!
//! A payload is one JSON object emitted by the storage provider. Only the
//! `api.name` field is required; the remaining metadata is parsed
//! permissively so a missing bucket or user agent never drops a record.
//! Payloads for operations outside the allow-list are skipped rather than
//! rejected.

use std::{net::IpAddr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::{NormalizationError, Result},
    model::{AuditId, CanonicalEvent, ObjectRef, Operation, ResponseStatus, UserInfo},
    time::{format_canonical, truncate_to_millis, Clock, RealClock},
};

/// Stage recorded on every normalized event.
pub const STAGE_RESPONSE_COMPLETE: &str = "ResponseComplete";

/// Static labels stamped onto every normalized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Origin label recorded in `workspace`.
    pub workspace: String,
    /// Resource kind recorded in `objectRef.resource`.
    pub resource: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { workspace: String::new(), resource: "storage".to_string() }
    }
}

/// Outcome of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The payload produced an event.
    Event(CanonicalEvent),
    /// The operation is not allow-listed; no event was produced.
    Skipped {
        /// Operation name found in the payload
        operation: String,
    },
}

impl Normalized {
    /// Returns the event, or `None` for a skipped payload.
    pub fn into_event(self) -> Option<CanonicalEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Skipped { .. } => None,
        }
    }

    /// Whether the payload was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Converts raw provider payloads into canonical events.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    /// Creates a normalizer stamping receive time from the system clock.
    pub fn new(config: NormalizerConfig) -> Self {
        Self::with_clock(config, Arc::new(RealClock::new()))
    }

    /// Creates a normalizer with an injected clock.
    pub fn with_clock(config: NormalizerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Normalizes one JSON payload.
    ///
    /// `source_ip` is the client address observed by the caller, recorded in
    /// `sourceIPs` when present.
    ///
    /// A payload without a `time` field is stamped with the current clock
    /// time. A payload whose `time` is present but not RFC 3339 is rejected.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the body is not a JSON object
    /// - `MissingField` if `api` or `api.name` is absent or not the right type
    /// - `InvalidTimestamp` if `time` cannot be parsed
    pub fn normalize(&self, body: &[u8], source_ip: Option<IpAddr>) -> Result<Normalized> {
        let payload: Value = serde_json::from_slice(body)?;
        let Value::Object(payload) = payload else {
            return Err(NormalizationError::malformed(format!(
                "expected a JSON object, found {}",
                json_type_name(&payload)
            )));
        };

        let api = payload
            .get("api")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::MissingField("api"))?;
        let name = api
            .get("name")
            .and_then(Value::as_str)
            .ok_or(NormalizationError::MissingField("api.name"))?;

        let Some(operation) = Operation::from_name(name) else {
            debug!(operation = name, "skipping unrecognized operation");
            return Ok(Normalized::Skipped { operation: name.to_string() });
        };

        let bucket = optional_str(api, "bucket");
        let object = optional_str(api, "object");
        let version = optional_str(&payload, "version");
        let time = optional_str(&payload, "time");
        let parent_user = optional_str(&payload, "parentUser");
        let user_agent = optional_str(&payload, "userAgent");

        let timestamp = if time.is_empty() {
            format_canonical(self.clock.now_utc())
        } else {
            truncate_to_millis(time)?
        };

        let event = CanonicalEvent {
            workspace: self.config.workspace.clone(),
            audit_id: AuditId::new(),
            stage: STAGE_RESPONSE_COMPLETE.to_string(),
            user: UserInfo { username: parent_user.to_string(), ..Default::default() },
            source_ips: source_ip.map(|ip| ip.to_string()).into_iter().collect(),
            user_agent: user_agent.to_string(),
            object_ref: ObjectRef {
                resource: self.config.resource.clone(),
                name: operation.as_str().to_string(),
                api_version: version.to_string(),
                ..Default::default()
            },
            response_status: ResponseStatus {
                reason: operation.reason(bucket, object),
                ..Default::default()
            },
            request_received_timestamp: timestamp.clone(),
            stage_timestamp: timestamp,
            ..Default::default()
        };

        debug!(
            audit_id = %event.audit_id,
            operation = %operation,
            bucket,
            "normalized audit payload"
        );

        Ok(Normalized::Event(event))
    }
}

/// Reads a string field, treating absent or non-string values as empty.
fn optional_str<'a>(object: &'a Map<String, Value>, key: &str) -> &'a str {
    object.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
