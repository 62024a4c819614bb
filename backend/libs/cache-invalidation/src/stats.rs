//! Statistics tracking for cache invalidation operations

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for invalidation operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvalidationStats {
    pub invalidations: u64,
    pub entries_marked_stale: u64,
    pub patches_applied: u64,
    pub patches_superseded: u64,
    pub writes_superseded: u64,
}

/// Thread-safe statistics collector
#[derive(Clone, Default)]
pub struct StatsCollector {
    invalidations: Arc<AtomicU64>,
    entries_marked_stale: Arc<AtomicU64>,
    patches_applied: Arc<AtomicU64>,
    patches_superseded: Arc<AtomicU64>,
    writes_superseded: Arc<AtomicU64>,
}

impl StatsCollector {
    /// Create new statistics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invalidation call and how many entries it touched
    pub fn record_invalidation(&self, touched: usize) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        self.entries_marked_stale
            .fetch_add(touched as u64, Ordering::Relaxed);
    }

    pub fn record_patch_applied(&self) {
        self.patches_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_patch_superseded(&self) {
        self.patches_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_superseded(&self) {
        self.writes_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> InvalidationStats {
        InvalidationStats {
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries_marked_stale: self.entries_marked_stale.load(Ordering::Relaxed),
            patches_applied: self.patches_applied.load(Ordering::Relaxed),
            patches_superseded: self.patches_superseded.load(Ordering::Relaxed),
            writes_superseded: self.writes_superseded.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.invalidations.store(0, Ordering::Relaxed);
        self.entries_marked_stale.store(0, Ordering::Relaxed);
        self.patches_applied.store(0, Ordering::Relaxed);
        self.patches_superseded.store(0, Ordering::Relaxed);
        self.writes_superseded.store(0, Ordering::Relaxed);
    }
}
