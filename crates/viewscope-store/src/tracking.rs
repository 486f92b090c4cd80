//! Lifecycle counters and live-bucket peak tracking.
//!
//! Keep this cheap: relaxed atomics only. Downstream can export a
//! `StatsSnapshot` to whatever metrics system it uses.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct StoreStats {
    created: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
    removed: AtomicU64,
    instances_destroyed: AtomicU64,
    destruction_failures: AtomicU64,
    peak_live: AtomicUsize,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub created: u64,
    pub evicted: u64,
    pub expired: u64,
    pub removed: u64,
    pub instances_destroyed: u64,
    pub destruction_failures: u64,
    pub peak_live: usize,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bucket was inserted and the map now holds `live` buckets.
    pub fn record_created(&self, live: usize) {
        self.created.fetch_add(1, Ordering::Relaxed);
        let mut cur = self.peak_live.load(Ordering::Relaxed);
        while live > cur {
            match self.peak_live.compare_exchange(
                cur,
                live,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(live, peak = self.peak_live.load(Ordering::Relaxed), "scope buckets");
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, n: u64) {
        self.expired.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_removed(&self, n: u64) {
        self.removed.fetch_add(n, Ordering::Relaxed);
    }

    /// One destroy callback ran; `ok` tells whether it succeeded.
    pub fn record_destroyed(&self, ok: bool) {
        if ok {
            self.instances_destroyed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.destruction_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            instances_destroyed: self.instances_destroyed.load(Ordering::Relaxed),
            destruction_failures: self.destruction_failures.load(Ordering::Relaxed),
            peak_live: self.peak_live.load(Ordering::Relaxed),
        }
    }
}
