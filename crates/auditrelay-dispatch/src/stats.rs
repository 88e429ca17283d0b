//! Lock-free dispatch counters.
//!
//! Every terminal state of a dispatch attempt increments exactly one counter.
//! The in-flight gauge covers admitted attempts only.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::error::FailureKind;

/// Counters shared by all dispatch attempts of one backend.
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    admission_timeouts: AtomicU64,
    send_timeouts: AtomicU64,
    transport_errors: AtomicU64,
    bad_statuses: AtomicU64,
    serialization_errors: AtomicU64,
    unavailable: AtomicU64,
    cancelled: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Point-in-time copy of the dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    /// Batches accepted by the collector.
    pub delivered: u64,
    /// Batches dropped because no slot freed up in time.
    pub admission_timeouts: u64,
    /// Batches whose send exceeded the deadline.
    pub send_timeouts: u64,
    /// Batches lost to connection failures.
    pub transport_errors: u64,
    /// Batches the collector answered with a non-200 status.
    pub bad_statuses: u64,
    /// Batches that could not be encoded.
    pub serialization_errors: u64,
    /// Batches refused because the backend was closed.
    pub unavailable: u64,
    /// Batches abandoned because their dispatch was cancelled.
    pub cancelled: u64,
    /// Admitted attempts currently running.
    pub in_flight: usize,
    /// Highest in-flight count observed.
    pub peak_in_flight: usize,
    /// Admission slots currently free.
    pub available_slots: usize,
}

impl DispatchStatsSnapshot {
    /// Total batches that ended in any failure state.
    pub fn failed(&self) -> u64 {
        self.admission_timeouts
            + self.send_timeouts
            + self.transport_errors
            + self.bad_statuses
            + self.serialization_errors
            + self.unavailable
            + self.cancelled
    }
}

impl DispatchStats {
    /// Records a delivered batch.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed batch under its terminal state.
    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::AdmissionTimeout => &self.admission_timeouts,
            FailureKind::SendTimeout => &self.send_timeouts,
            FailureKind::Transport => &self.transport_errors,
            FailureKind::BadStatus => &self.bad_statuses,
            FailureKind::Serialization => &self.serialization_errors,
            FailureKind::Unavailable => &self.unavailable,
            FailureKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks an attempt as admitted. The returned guard marks it finished
    /// when dropped.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::AcqRel);
        InFlightGuard { stats: self }
    }

    /// Copies the counters. `available_slots` is supplied by the backend.
    pub fn snapshot(&self, available_slots: usize) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            admission_timeouts: self.admission_timeouts.load(Ordering::Relaxed),
            send_timeouts: self.send_timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            bad_statuses: self.bad_statuses.load(Ordering::Relaxed),
            serialization_errors: self.serialization_errors.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            available_slots,
        }
    }
}

/// Decrements the in-flight gauge on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    stats: &'a DispatchStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
