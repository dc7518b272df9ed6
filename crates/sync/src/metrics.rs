use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for conditions that are not errors but should be visible when
/// diagnosing a misplaced or duplicated comment.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    reconciliation_misses: AtomicU64,
    parent_fallbacks: AtomicU64,
    folded_duplicates: AtomicU64,
    stale_pages_discarded: AtomicU64,
    connect_attempts: AtomicU64,
    remote_writes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub reconciliation_misses: u64,
    pub parent_fallbacks: u64,
    pub folded_duplicates: u64,
    pub stale_pages_discarded: u64,
    pub connect_attempts: u64,
    pub remote_writes: u64,
}

impl SyncMetrics {
    pub fn record_reconciliation_miss(&self) {
        self.reconciliation_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parent_fallback(&self) {
        self.parent_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_folded_duplicate(&self) {
        self.folded_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_page(&self) {
        self.stale_pages_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_write(&self) {
        self.remote_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reconciliation_misses: self.reconciliation_misses.load(Ordering::Relaxed),
            parent_fallbacks: self.parent_fallbacks.load(Ordering::Relaxed),
            folded_duplicates: self.folded_duplicates.load(Ordering::Relaxed),
            stale_pages_discarded: self.stale_pages_discarded.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            remote_writes: self.remote_writes.load(Ordering::Relaxed),
        }
    }
}
