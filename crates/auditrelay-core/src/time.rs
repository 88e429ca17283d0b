//! Time abstractions and the canonical timestamp format.
//!
//! Provides a clock abstraction so events stamped with receive time can be
//! tested deterministically, and the conversion of provider timestamps to the
//! millisecond-precision form the collector expects.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{NormalizationError, Result};

/// Clock abstraction for event timestamps.
///
/// Production code uses `RealClock`, tests can inject `TestClock`.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock for deterministic time control.
///
/// Clones share the same underlying time, so a handle kept by the test can
/// advance the clock owned by the code under test.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Wall-clock time as microseconds since the UNIX epoch
    micros: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock starting at the current time.
    pub fn new() -> Self {
        Self::with_start_time(Utc::now())
    }

    /// Creates a test clock starting at a specific time.
    pub fn with_start_time(start: DateTime<Utc>) -> Self {
        Self { micros: Arc::new(AtomicI64::new(start.timestamp_micros())) }
    }

    /// Advances the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        self.micros.fetch_add(micros, Ordering::AcqRel);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::Acquire)).unwrap_or_default()
    }
}

/// Formats a time in the canonical form: UTC, millisecond precision, `Z`.
pub fn format_canonical(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp and re-renders it in the canonical form.
///
/// Sub-millisecond digits are truncated, not rounded. Offsets other than `Z`
/// are converted to UTC.
///
/// # Errors
///
/// Returns `NormalizationError::InvalidTimestamp` if the value is not valid
/// RFC 3339.
pub fn truncate_to_millis(raw: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| NormalizationError::invalid_timestamp(raw, e.to_string()))?;

    Ok(format_canonical(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microsecond_input_truncates_to_millis() {
        assert_eq!(
            truncate_to_millis("2024-01-02T03:04:05.123456Z").unwrap(),
            "2024-01-02T03:04:05.123Z"
        );
        assert_eq!(
            truncate_to_millis("2023-05-17T03:32:47.394877Z").unwrap(),
            "2023-05-17T03:32:47.394Z"
        );
    }

    #[test]
    fn truncation_never_rounds_up() {
        assert_eq!(
            truncate_to_millis("2024-12-31T23:59:59.999999Z").unwrap(),
            "2024-12-31T23:59:59.999Z"
        );
    }

    #[test]
    fn short_fractions_are_padded() {
        assert_eq!(truncate_to_millis("2024-01-02T03:04:05Z").unwrap(), "2024-01-02T03:04:05.000Z");
        assert_eq!(
            truncate_to_millis("2024-01-02T03:04:05.1Z").unwrap(),
            "2024-01-02T03:04:05.100Z"
        );
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        assert_eq!(
            truncate_to_millis("2024-01-02T11:04:05.123456+08:00").unwrap(),
            "2024-01-02T03:04:05.123Z"
        );
    }

    #[test]
    fn non_conforming_input_is_rejected() {
        for raw in ["", "2024-01-02", "2024-01-02 03:04:05", "yesterday", "2024-13-02T03:04:05Z"] {
            let err = truncate_to_millis(raw).unwrap_err();
            assert!(
                matches!(err, NormalizationError::InvalidTimestamp { ref value, .. } if value == raw),
                "expected invalid timestamp for {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_clock_advances() {
        let start = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = TestClock::with_start_time(start);
        let handle = clock.clone();

        assert_eq!(format_canonical(clock.now_utc()), "2024-01-02T03:04:05.123Z");

        handle.advance(Duration::from_millis(1500));
        assert_eq!(format_canonical(clock.now_utc()), "2024-01-02T03:04:06.623Z");
    }
}
