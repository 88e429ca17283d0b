//! Property-based tests for normalizer invariants.
//!
//! Checks the allow-list filter, reason templating, audit ID uniqueness, and
//! wire round trips of opaque payloads over generated inputs. Deterministic
//! and in-memory.

#![allow(clippy::unwrap_used)] // Test regex patterns are known to be valid

use std::collections::HashSet;

use auditrelay_core::{
    CanonicalEvent, EventBatch, Normalized, Normalizer, NormalizerConfig, Operation,
};
use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use serde_json::{json, Map, Value};

/// Deterministic property test configuration for CI stability.
fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        timeout: 5000,
        fork: false,
        failure_persistence: None,
        source_file: None,
        ..ProptestConfig::default()
    }
}

/// Operation names that are not on the allow-list.
fn unknown_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z]{0,30}")
        .unwrap()
        .prop_filter("allow-listed names are not unknown", |name| {
            Operation::from_name(name).is_none()
        })
}

/// Bucket and object names as the provider emits them.
fn storage_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9._/-]{0,40}").unwrap()
}

/// Arbitrary JSON with nulls at every depth, including the top level.
fn opaque_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::from),
    ];

    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn normalizer() -> Normalizer {
    Normalizer::new(NormalizerConfig::default())
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Payloads naming an unrecognized operation never produce events.
    #[test]
    fn unknown_operations_are_always_skipped(
        name in unknown_name_strategy(),
        bucket in storage_name_strategy(),
        object in storage_name_strategy(),
    ) {
        let body = json!({
            "time": "2024-01-02T03:04:05.123456Z",
            "parentUser": "admin",
            "api": {"name": name, "bucket": bucket, "object": object}
        });

        let outcome = normalizer().normalize(body.to_string().as_bytes(), None).unwrap();

        prop_assert_eq!(outcome, Normalized::Skipped { operation: name });
    }

    /// Upload reasons always mention both the bucket and the object.
    #[test]
    fn put_object_reason_names_bucket_and_object(
        bucket in storage_name_strategy(),
        object in storage_name_strategy(),
    ) {
        let body = json!({"api": {"name": "PutObject", "bucket": bucket, "object": object}});

        let event = normalizer()
            .normalize(body.to_string().as_bytes(), None)
            .unwrap()
            .into_event()
            .unwrap();

        prop_assert!(event.response_status.reason.contains(&bucket));
        prop_assert!(event.response_status.reason.contains(&object));
    }

    /// Every allow-listed operation yields an event naming that operation.
    #[test]
    fn allow_listed_operations_always_produce_events(
        op in prop::sample::select(Operation::ALL.to_vec()),
        bucket in storage_name_strategy(),
    ) {
        let body = json!({"api": {"name": op.as_str(), "bucket": bucket}});

        let event = normalizer()
            .normalize(body.to_string().as_bytes(), None)
            .unwrap()
            .into_event()
            .unwrap();

        prop_assert_eq!(event.object_ref.name.as_str(), op.as_str());
        prop_assert_eq!(event.response_status.code, 200);
        prop_assert_eq!(event.response_status.reason, op.reason(&bucket, ""));
    }

    /// Repeated normalization of identical input yields distinct audit IDs.
    #[test]
    fn audit_ids_are_pairwise_distinct(repeats in 2usize..40) {
        let body = br#"{"api": {"name": "DeleteMultipleObjects", "bucket": "b", "object": "o"}}"#;
        let normalizer = normalizer();

        let ids: HashSet<_> = (0..repeats)
            .map(|_| normalizer.normalize(body, None).unwrap().into_event().unwrap().audit_id)
            .collect();

        prop_assert_eq!(ids.len(), repeats);
    }

    /// Opaque payloads, `null` included, decode to the value that was sent.
    #[test]
    fn opaque_payloads_round_trip(
        impersonated_user in opaque_value_strategy(),
        request_object in opaque_value_strategy(),
        response_object in opaque_value_strategy(),
    ) {
        let batch = EventBatch::single(CanonicalEvent {
            impersonated_user,
            request_object,
            response_object,
            ..Default::default()
        });

        let encoded = serde_json::to_vec(&batch).unwrap();
        let decoded: EventBatch = serde_json::from_slice(&encoded).unwrap();

        prop_assert_eq!(decoded, batch);
    }
}
