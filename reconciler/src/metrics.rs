//! Counters for reconciler health.
//!
//! A trimmed-down version of the monitoring primitives used elsewhere in
//! the stack: atomic counters, relaxed ordering, no labels.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters maintained by the cache.
#[derive(Debug, Default)]
pub struct ReconcilerMetrics {
    /// Events accepted and merged.
    pub events_applied: Counter,
    /// Duplicate signatures discarded (reconciliation conflicts).
    pub duplicates_discarded: Counter,
    /// Unclassifiable events discarded.
    pub unknown_discarded: Counter,
    /// Reads that returned a stale record.
    pub stale_reads: Counter,
    /// Absolute overwrites from ledger polling.
    pub syncs: Counter,
}
