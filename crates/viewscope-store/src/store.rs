//! ScopedResourceStore: the shared map from scope id to bucket.
//!
//! One map-level mutex guards membership, access timestamps and the recency
//! sequence. Every decision that can end a bucket (expiry on lookup, LRU
//! eviction, explicit removal, sweeps) is taken and acted on under that lock:
//! the bucket leaves the map and is drained in the same critical section.
//! The destroy callbacks for the drained instances then run after the lock is
//! released, but before the triggering call returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use viewscope_core::{Clock, Destroyer, Error, Result, ScopeId, StoreConfig, SystemClock};

use crate::bucket::{Drained, ResourceBucket};
use crate::destruction::{DestructionCoordinator, DestructionReport};
use crate::handle::BucketHandle;
use crate::policy::EvictionPolicy;
use crate::tracking::{StatsSnapshot, StoreStats};

type Bucket<D> = ResourceBucket<<D as Destroyer>::Handle, <D as Destroyer>::Context>;

/// A bucket that has left the map and been drained, awaiting its callbacks.
type Detached<D> = (ScopeId, Drained<<D as Destroyer>::Handle, <D as Destroyer>::Context>);

struct Slots<D: Destroyer> {
    buckets: HashMap<ScopeId, Arc<Bucket<D>>>,
    next_recency: u64,
}

impl<D: Destroyer> Slots<D> {
    fn bump(&mut self) -> u64 {
        let r = self.next_recency;
        self.next_recency += 1;
        r
    }

    /// Remove `id` and drain it, atomically with respect to every other
    /// structural operation (the caller holds the map lock).
    fn detach(&mut self, id: ScopeId) -> Option<Detached<D>> {
        let bucket = self.buckets.remove(&id)?;
        bucket.drain().map(|drained| (id, drained))
    }
}

#[derive(Debug, Clone, Copy)]
enum Teardown {
    Removed,
    Expired,
}

pub struct ScopedResourceStore<D: Destroyer, K: Clock = SystemClock> {
    config: StoreConfig,
    policy: EvictionPolicy,
    clock: K,
    coordinator: DestructionCoordinator<D>,
    stats: Arc<StoreStats>,
    slots: Mutex<Slots<D>>,
}

impl<D: Destroyer> ScopedResourceStore<D, SystemClock> {
    pub fn new(config: StoreConfig, destroyer: D) -> Result<Self> {
        Self::with_clock(config, destroyer, SystemClock::new())
    }

    /// Build a store from `VIEWSCOPE_*` environment settings.
    pub fn from_env(destroyer: D) -> Result<Self> {
        Self::new(StoreConfig::from_env()?, destroyer)
    }
}

impl<D: Destroyer, K: Clock> ScopedResourceStore<D, K> {
    pub fn with_clock(config: StoreConfig, destroyer: D, clock: K) -> Result<Self> {
        Self::with_shared_destroyer(config, Arc::new(destroyer), clock)
    }

    pub fn with_shared_destroyer(config: StoreConfig, destroyer: Arc<D>, clock: K) -> Result<Self> {
        config.validate().map_err(Error::from)?;
        let stats = Arc::new(StoreStats::new());
        Ok(Self {
            policy: EvictionPolicy::from_config(&config),
            config,
            clock,
            coordinator: DestructionCoordinator::with_stats(destroyer, Arc::clone(&stats)),
            stats,
            slots: Mutex::new(Slots {
                buckets: HashMap::new(),
                next_recency: 0,
            }),
        })
    }

    /// Return the bucket for `id`, creating an empty one if none exists.
    ///
    /// An existing bucket idle for longer than the TTL is torn down and
    /// `Error::ExpiredScope` is returned instead; the caller never gets access
    /// to expired state. Creating a bucket while `max_active_scopes` are live
    /// first evicts and destroys the least recently used one.
    pub fn get_or_create_bucket(&self, id: ScopeId) -> Result<BucketHandle<D>> {
        let mut evicted: Vec<Detached<D>> = Vec::new();

        let bucket = {
            let mut slots = self.lock_slots();
            // Read under the lock so access times never move backwards.
            let now = self.clock.now_ms();
            let recency = slots.bump();
            let existing = slots.buckets.get(&id).cloned();

            match existing {
                Some(bucket) if self.policy.is_expired(bucket.last_accessed_ms(), now) => {
                    let idle_secs = bucket.idle_secs(now);
                    let detached = slots.detach(id);
                    drop(slots);
                    self.stats.record_expired(1);
                    #[cfg(feature = "tracing")]
                    tracing::info!(scope = %id, idle_secs, ttl_secs = self.policy.ttl_secs(), "scope expired on access");
                    if let Some(d) = detached {
                        self.coordinator.dispose(d.0, d.1);
                    }
                    return Err(Error::ExpiredScope {
                        id,
                        idle_secs,
                        ttl_secs: self.policy.ttl_secs(),
                    });
                }
                Some(bucket) => {
                    bucket.touch(now, recency);
                    bucket
                }
                None => {
                    while self.policy.must_evict(slots.buckets.len()) {
                        let victim = self
                            .policy
                            .select_victim(slots.buckets.values().map(|b| b.recency_key()));
                        let Some(victim) = victim else { break };
                        if let Some(d) = slots.detach(victim) {
                            self.stats.record_evicted();
                            #[cfg(feature = "tracing")]
                            tracing::info!(scope = %victim, incoming = %id, "evicting least recently used scope");
                            evicted.push(d);
                        }
                    }
                    let bucket = Arc::new(ResourceBucket::new(id, now, recency));
                    slots.buckets.insert(id, Arc::clone(&bucket));
                    self.stats.record_created(slots.buckets.len());
                    #[cfg(feature = "tracing")]
                    tracing::debug!(scope = %id, live = slots.buckets.len(), "created scope bucket");
                    bucket
                }
            }
        };

        for (victim, drained) in evicted {
            self.coordinator.dispose(victim, drained);
        }
        Ok(BucketHandle::new(bucket, self.coordinator.clone()))
    }

    /// Destroy and remove the bucket for `id`. Missing ids are a no-op.
    pub fn remove(&self, id: ScopeId) -> DestructionReport {
        let detached = self.lock_slots().detach(id);
        match detached {
            Some(d) => {
                self.stats.record_removed(1);
                #[cfg(feature = "tracing")]
                tracing::debug!(scope = %id, "removing scope bucket");
                self.dispose_all(vec![d])
            }
            None => DestructionReport::default(),
        }
    }

    /// Destroy and remove every bucket for which `predicate` holds.
    ///
    /// The predicate runs under the map lock and must not call back into the
    /// store.
    pub fn destroy_all<P>(&self, predicate: P) -> DestructionReport
    where
        P: FnMut(&Bucket<D>) -> bool,
    {
        self.teardown(predicate, Teardown::Removed)
    }

    /// Sweep: destroy every bucket idle for longer than the TTL.
    pub fn destroy_expired(&self) -> DestructionReport {
        let now = self.clock.now_ms();
        let policy = self.policy;
        self.teardown(
            |b| policy.is_expired(b.last_accessed_ms(), now),
            Teardown::Expired,
        )
    }

    /// Whole-session teardown: destroy every bucket.
    pub fn clear(&self) -> DestructionReport {
        self.destroy_all(|_| true)
    }

    fn teardown<P>(&self, mut predicate: P, kind: Teardown) -> DestructionReport
    where
        P: FnMut(&Bucket<D>) -> bool,
    {
        let detached: Vec<Detached<D>> = {
            let mut slots = self.lock_slots();
            let doomed: Vec<ScopeId> = slots
                .buckets
                .values()
                .filter(|b| predicate(b))
                .map(|b| b.id())
                .collect();
            doomed
                .into_iter()
                .filter_map(|id| slots.detach(id))
                .collect()
        };

        if detached.is_empty() {
            return DestructionReport::default();
        }
        let n = detached.len() as u64;
        match kind {
            Teardown::Removed => self.stats.record_removed(n),
            Teardown::Expired => self.stats.record_expired(n),
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(scopes = n, ?kind, "tearing down scope buckets");
        self.dispose_all(detached)
    }

    fn dispose_all(&self, detached: Vec<Detached<D>>) -> DestructionReport {
        let mut report = DestructionReport::default();
        for (id, drained) in detached {
            report.merge(self.coordinator.dispose(id, drained));
        }
        report
    }

    pub fn len(&self) -> usize {
        self.lock_slots().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test. Does not refresh the access time.
    pub fn contains(&self, id: ScopeId) -> bool {
        self.lock_slots().buckets.contains_key(&id)
    }

    /// Live scope ids, least recently used first.
    pub fn scope_ids(&self) -> Vec<ScopeId> {
        let slots = self.lock_slots();
        let mut keys: Vec<_> = slots.buckets.values().map(|b| b.recency_key()).collect();
        keys.sort();
        keys.into_iter().map(|k| k.id).collect()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn destroyer(&self) -> &D {
        self.coordinator.destroyer()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots<D>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Destroyer, K: Clock> Drop for ScopedResourceStore<D, K> {
    fn drop(&mut self) {
        let _report = self.clear();
        #[cfg(feature = "tracing")]
        if _report.scopes > 0 {
            tracing::debug!(scopes = _report.scopes, "store dropped with live scopes");
        }
    }
}
