//! Eviction and expiry decisions. Pure functions, no shared state.

use viewscope_core::{ScopeId, StoreConfig};

/// Whole seconds elapsed between `last_accessed_ms` and `now_ms`.
pub fn idle_secs(last_accessed_ms: u64, now_ms: u64) -> u64 {
    now_ms.saturating_sub(last_accessed_ms) / 1000
}

/// Strictly greater-than: a bucket idle for exactly `ttl_secs` is still live.
pub fn is_expired(last_accessed_ms: u64, ttl_secs: u64, now_ms: u64) -> bool {
    idle_secs(last_accessed_ms, now_ms) > ttl_secs
}

/// Total LRU order of a bucket. Derived `Ord` compares the access time first,
/// then the recency sequence, which is unique per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecencyKey {
    pub last_accessed_ms: u64,
    pub recency: u64,
    pub id: ScopeId,
}

/// Least recently used candidate, if any.
pub fn select_victim<I>(candidates: I) -> Option<ScopeId>
where
    I: IntoIterator<Item = RecencyKey>,
{
    candidates.into_iter().min().map(|k| k.id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    max_active: usize,
    ttl_secs: u64,
}

impl EvictionPolicy {
    pub fn new(max_active: usize, ttl_secs: u64) -> Self {
        Self {
            max_active: max_active.max(1),
            ttl_secs,
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self::new(cfg.max_active_scopes, cfg.scope_ttl_secs)
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Whether one bucket must go before another is inserted next to `live`
    /// existing ones. `max_active` buckets are admitted before the first
    /// eviction.
    pub fn must_evict(&self, live: usize) -> bool {
        live >= self.max_active
    }

    pub fn is_expired(&self, last_accessed_ms: u64, now_ms: u64) -> bool {
        is_expired(last_accessed_ms, self.ttl_secs, now_ms)
    }

    pub fn select_victim<I>(&self, candidates: I) -> Option<ScopeId>
    where
        I: IntoIterator<Item = RecencyKey>,
    {
        select_victim(candidates)
    }
}
