//! Canonical audit event model.
//!
//! Defines the normalized audit record consumed by the external collector,
//! its nested value objects, the batch envelope, and the allow-listed storage
//! operations. Field names on the wire are fixed by the collector; every
//! optional field is rendered as `null` when unset so the encoding decodes
//! back to an identical value. Opaque payloads are plain JSON values with
//! `null` meaning absent, so a `null` can never collapse into a different
//! Rust value on decode.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Strongly-typed audit identifier.
///
/// Assigned exactly once when an event is normalized. Serialized as a plain
/// UUID string.
///
/// # Example
///
/// ```
/// use auditrelay_core::AuditId;
/// let audit_id = AuditId::new();
/// println!("Forwarding audit event: {}", audit_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(pub Uuid);

impl AuditId {
    /// Creates a new random audit ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AuditId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Storage operations that produce audit events.
///
/// Payloads naming any other operation are skipped by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Object upload.
    PutObject,
    /// Bulk object deletion.
    DeleteMultipleObjects,
    /// Bucket creation.
    PutBucket,
    /// Bucket deletion.
    DeleteBucket,
    /// Console login (reported by the provider as a site replication query).
    SiteReplicationInfo,
}

impl Operation {
    /// Every recognized operation, in allow-list order.
    pub const ALL: [Self; 5] = [
        Self::PutObject,
        Self::DeleteMultipleObjects,
        Self::PutBucket,
        Self::DeleteBucket,
        Self::SiteReplicationInfo,
    ];

    /// Looks up an operation by its provider name. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Provider name of the operation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PutObject => "PutObject",
            Self::DeleteMultipleObjects => "DeleteMultipleObjects",
            Self::PutBucket => "PutBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::SiteReplicationInfo => "SiteReplicationInfo",
        }
    }

    /// Human-readable reason recorded in `responseStatus.reason`.
    pub fn reason(&self, bucket: &str, object: &str) -> String {
        match self {
            Self::PutObject => format!("uploaded {object} to bucket ({bucket})"),
            Self::DeleteMultipleObjects => format!("deleted {object} from bucket ({bucket})"),
            Self::PutBucket => format!("created bucket {bucket}"),
            Self::DeleteBucket => format!("deleted bucket {bucket}"),
            Self::SiteReplicationInfo => "login".to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity that performed the audited action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Account name.
    pub username: String,
    /// Group memberships. Serialized as a sorted array.
    pub groups: BTreeSet<String>,
}

/// Resource the audited action targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Resource kind label.
    pub resource: String,
    /// Namespace, unused for storage events.
    pub namespace: String,
    /// Operation name.
    pub name: String,
    /// Resource UID.
    #[serde(rename = "UID")]
    pub uid: String,
    /// API group.
    #[serde(rename = "APIGroup")]
    pub api_group: String,
    /// Provider payload version.
    #[serde(rename = "APIVersion")]
    pub api_version: String,
    /// Resource version.
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
    /// Subresource.
    pub subresource: String,
}

/// Outcome reported for the audited action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseStatus {
    /// Status code of the audited action.
    pub code: u16,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Human-readable description of what happened.
    pub reason: String,
    /// Severity label.
    pub status: String,
}

impl Default for ResponseStatus {
    fn default() -> Self {
        Self {
            code: 200,
            metadata: BTreeMap::new(),
            reason: String::new(),
            status: "INFO".to_string(),
        }
    }
}

/// One normalized audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    /// DevOps project label.
    pub devops: String,
    /// Origin label of the relaying instance.
    pub workspace: String,
    /// Cluster label.
    pub cluster: String,
    /// Free-text message.
    pub message: String,
    /// Audit level.
    pub level: String,
    /// Unique identifier, assigned at normalization.
    #[serde(rename = "auditID")]
    pub audit_id: AuditId,
    /// Processing stage the record describes.
    pub stage: String,
    /// Request URI.
    #[serde(rename = "requestURI")]
    pub request_uri: String,
    /// Request verb.
    pub verb: String,
    /// Acting identity.
    pub user: UserInfo,
    /// Impersonated identity, opaque. `null` when absent.
    #[serde(default)]
    pub impersonated_user: Value,
    /// Observed client addresses, in order.
    #[serde(rename = "sourceIPs")]
    pub source_ips: Vec<String>,
    /// Client user agent.
    pub user_agent: String,
    /// Targeted resource.
    pub object_ref: ObjectRef,
    /// Reported outcome.
    pub response_status: ResponseStatus,
    /// Request payload, normally `null`.
    #[serde(default)]
    pub request_object: Value,
    /// Response payload, normally `null`.
    #[serde(default)]
    pub response_object: Value,
    /// Millisecond-precision RFC 3339 timestamp.
    pub request_received_timestamp: String,
    /// Millisecond-precision RFC 3339 timestamp.
    pub stage_timestamp: String,
    /// Free-form annotations.
    pub annotations: Option<BTreeMap<String, String>>,
}

impl CanonicalEvent {
    /// Recognized operation named by `objectRef.name`, if any.
    ///
    /// Always `Some` for events built by the normalizer; caller-synthesized
    /// events may carry arbitrary names.
    pub fn operation(&self) -> Option<Operation> {
        Operation::from_name(&self.object_ref.name)
    }
}

/// Ordered batch of events delivered in a single POST.
///
/// Serialized as `{"items": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Events in insertion order.
    pub items: Vec<CanonicalEvent>,
}

impl EventBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch holding one event.
    pub fn single(event: CanonicalEvent) -> Self {
        Self { items: vec![event] }
    }

    /// Appends an event, preserving insertion order.
    pub fn push(&mut self, event: CanonicalEvent) {
        self.items.push(event);
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Audit IDs of every event, in order.
    pub fn audit_ids(&self) -> Vec<AuditId> {
        self.items.iter().map(|event| event.audit_id).collect()
    }

    /// Operation names of every event, in order.
    pub fn operations(&self) -> Vec<&str> {
        self.items.iter().map(|event| event.object_ref.name.as_str()).collect()
    }
}

impl From<Vec<CanonicalEvent>> for EventBatch {
    fn from(items: Vec<CanonicalEvent>) -> Self {
        Self { items }
    }
}

impl FromIterator<CanonicalEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = CanonicalEvent>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}
