//! Builders for provider payloads and canonical events.

use auditrelay_core::{AuditId, CanonicalEvent, ObjectRef, Operation, ResponseStatus};
use serde_json::{json, Map, Value};

/// Builder for provider audit payloads.
///
/// Starts from a complete upload record; setters override single fields and
/// `without` removes one entirely.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    api: Map<String, Value>,
    top: Map<String, Value>,
}

impl PayloadBuilder {
    /// Creates a payload for `operation` with no other fields.
    pub fn new(operation: impl Into<String>) -> Self {
        let mut api = Map::new();
        api.insert("name".to_string(), Value::String(operation.into()));
        Self { api, top: Map::new() }
    }

    /// Creates a fully populated upload payload.
    pub fn put_object() -> Self {
        Self::new(Operation::PutObject.as_str())
            .bucket("photos")
            .object("2024/cat.png")
            .version("1")
            .time("2024-01-02T03:04:05.123456Z")
            .parent_user("admin")
            .user_agent("MinIO (linux; amd64) minio-go/v7.0.52")
    }

    /// Sets `api.bucket`.
    pub fn bucket(mut self, bucket: &str) -> Self {
        self.api.insert("bucket".to_string(), json!(bucket));
        self
    }

    /// Sets `api.object`.
    pub fn object(mut self, object: &str) -> Self {
        self.api.insert("object".to_string(), json!(object));
        self
    }

    /// Sets `version`.
    pub fn version(self, version: &str) -> Self {
        self.field("version", json!(version))
    }

    /// Sets `time`.
    pub fn time(self, time: &str) -> Self {
        self.field("time", json!(time))
    }

    /// Sets `parentUser`.
    pub fn parent_user(self, user: &str) -> Self {
        self.field("parentUser", json!(user))
    }

    /// Sets `userAgent`.
    pub fn user_agent(self, agent: &str) -> Self {
        self.field("userAgent", json!(agent))
    }

    /// Sets an arbitrary top-level field.
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.top.insert(key.to_string(), value);
        self
    }

    /// Removes a top-level field.
    pub fn without(mut self, key: &str) -> Self {
        self.top.remove(key);
        self
    }

    /// Builds the payload as a JSON value.
    pub fn build(self) -> Value {
        let mut payload = self.top;
        payload.insert("api".to_string(), Value::Object(self.api));
        Value::Object(payload)
    }

    /// Builds the payload as a request body.
    pub fn to_body(self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

/// Creates a caller-synthesized event for `operation`.
pub fn event(operation: Operation) -> CanonicalEvent {
    CanonicalEvent {
        audit_id: AuditId::new(),
        stage: "ResponseComplete".to_string(),
        object_ref: ObjectRef {
            resource: "storage".to_string(),
            name: operation.as_str().to_string(),
            ..Default::default()
        },
        response_status: ResponseStatus {
            reason: operation.reason("fixtures", "object.bin"),
            ..Default::default()
        },
        request_received_timestamp: "2024-01-02T03:04:05.123Z".to_string(),
        stage_timestamp: "2024-01-02T03:04:05.123Z".to_string(),
        ..Default::default()
    }
}
