//! Lock-free progress counters for an in-flight harvest run

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared counters updated by workers and read by observers.
///
/// Every target reaches exactly one terminal outcome (written, skipped, or
/// failed), and `attempted` is incremented once per terminal outcome, so
/// `attempted == written + skipped_existing + skipped_absent + failed` holds
/// at every quiescent point.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    attempted: AtomicU64,
    written: AtomicU64,
    skipped_existing: AtomicU64,
    skipped_absent: AtomicU64,
    failed: AtomicU64,
    queue_depth: AtomicI64,
    queue_high_water: AtomicU64,
}

impl ProgressCounters {
    /// Create a fresh set of zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact written to the store.
    pub fn record_written(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a target skipped because its artifact already exists.
    pub fn record_skipped_existing(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.skipped_existing.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a target skipped because the server returned 404.
    pub fn record_skipped_absent(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.skipped_absent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a target that failed with a non-404 error.
    pub fn record_failed(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an item handed to the work queue. Called after a successful
    /// send, so the gauge never reports more items than the queue can hold.
    pub fn enqueued(&self) {
        let depth = self.queue_depth.fetch_add(1, Ordering::Relaxed) + 1;
        if depth > 0 {
            self.raise_high_water(depth as u64);
        }
    }

    /// Record an item leaving the work queue.
    pub fn dequeued(&self) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn raise_high_water(&self, depth: u64) {
        let mut current = self.queue_high_water.load(Ordering::Relaxed);
        while depth > current {
            match self.queue_high_water.compare_exchange_weak(
                current,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Take a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> HarvestSummary {
        HarvestSummary {
            attempted: self.attempted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            skipped_existing: self.skipped_existing.load(Ordering::Relaxed),
            skipped_absent: self.skipped_absent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            queue_high_water: self.queue_high_water.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a run's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    /// Targets that reached any terminal outcome
    pub attempted: u64,
    /// Artifacts fetched and written this run
    pub written: u64,
    /// Targets skipped because their artifact already existed
    pub skipped_existing: u64,
    /// Targets skipped because the server returned 404
    pub skipped_absent: u64,
    /// Targets that failed with a non-404 error
    pub failed: u64,
    /// Highest observed depth of the bounded work queue
    pub queue_high_water: u64,
}

impl HarvestSummary {
    /// Terminal outcomes counting toward completion, including skips.
    pub fn completed(&self) -> u64 {
        self.written + self.skipped_existing + self.skipped_absent
    }
}
