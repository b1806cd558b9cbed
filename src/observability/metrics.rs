//! Metrics registry for form compilation
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters describing the work done by the compiler
///
/// All counters use atomic operations with Relaxed ordering.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Materialize attempts
    probe_iterations: AtomicU64,
    /// Tables created in the store
    tables_created: AtomicU64,
    /// Tables dropped because their layout changed
    tables_dropped: AtomicU64,
    /// Width overflows reported by the store
    overflows: AtomicU64,
    /// Group subtrees moved to a new table
    group_relocations: AtomicU64,
    /// Phantom tables introduced
    phantom_tables: AtomicU64,
    /// Rollbacks performed
    rollbacks: AtomicU64,
    /// Drops that failed during rollback
    rollback_drop_failures: AtomicU64,
    /// Forms committed
    forms_committed: AtomicU64,
    /// Identical re-uploads answered from the store
    forms_reused: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_probe_iterations(&self) {
        self.probe_iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tables_created(&self) {
        self.tables_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tables_dropped(&self) {
        self.tables_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_overflows(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_group_relocations(&self) {
        self.group_relocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_phantom_tables(&self) {
        self.phantom_tables.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollback_drop_failures(&self) {
        self.rollback_drop_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_forms_committed(&self) {
        self.forms_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_forms_reused(&self) {
        self.forms_reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            probe_iterations: self.probe_iterations.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            tables_dropped: self.tables_dropped.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            group_relocations: self.group_relocations.load(Ordering::Relaxed),
            phantom_tables: self.phantom_tables.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            rollback_drop_failures: self.rollback_drop_failures.load(Ordering::Relaxed),
            forms_committed: self.forms_committed.load(Ordering::Relaxed),
            forms_reused: self.forms_reused.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub probe_iterations: u64,
    pub tables_created: u64,
    pub tables_dropped: u64,
    pub overflows: u64,
    pub group_relocations: u64,
    pub phantom_tables: u64,
    pub rollbacks: u64,
    pub rollback_drop_failures: u64,
    pub forms_committed: u64,
    pub forms_reused: u64,
}
