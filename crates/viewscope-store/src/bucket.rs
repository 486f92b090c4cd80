//! Per-scope bucket of managed instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use viewscope_core::{Error, ManagedInstance, Result, ScopeId};

use crate::policy::{self, RecencyKey};

/// Instances drained out of a bucket, ready to be destroyed.
pub(crate) type Drained<H, C> = Vec<(String, ManagedInstance<H, C>)>;

struct BucketState<H, C> {
    instances: HashMap<String, ManagedInstance<H, C>>,
    destroyed: bool,
}

/// Outcome of inserting a freshly created instance.
pub(crate) enum Insert<H, C> {
    Stored(H),
    /// Another caller stored an instance under the same name first.
    Lost {
        existing: H,
        rejected: ManagedInstance<H, C>,
    },
    /// The bucket is being destroyed; nothing may be added.
    Closed(ManagedInstance<H, C>),
}

/// Named instances belonging to one scope, plus access bookkeeping.
///
/// The access timestamp and recency sequence are only written by the store
/// while it holds its map lock. The instance map has its own lock so that
/// requests for one scope never contend with unrelated scopes.
pub struct ResourceBucket<H, C> {
    id: ScopeId,
    created_at_ms: u64,
    last_accessed_ms: AtomicU64,
    recency: AtomicU64,
    state: Mutex<BucketState<H, C>>,
}

impl<H: Clone, C> ResourceBucket<H, C> {
    pub(crate) fn new(id: ScopeId, now_ms: u64, recency: u64) -> Self {
        Self {
            id,
            created_at_ms: now_ms,
            last_accessed_ms: AtomicU64::new(now_ms),
            recency: AtomicU64::new(recency),
            state: Mutex::new(BucketState {
                instances: HashMap::new(),
                destroyed: false,
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn last_accessed_ms(&self) -> u64 {
        self.last_accessed_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self, now_ms: u64, recency: u64) {
        self.last_accessed_ms.fetch_max(now_ms, Ordering::Relaxed);
        self.recency.store(recency, Ordering::Relaxed);
    }

    pub(crate) fn recency_key(&self) -> RecencyKey {
        RecencyKey {
            last_accessed_ms: self.last_accessed_ms(),
            recency: self.recency.load(Ordering::Relaxed),
            id: self.id,
        }
    }

    /// Whole seconds since the last access.
    pub fn idle_secs(&self, now_ms: u64) -> u64 {
        policy::idle_secs(self.last_accessed_ms(), now_ms)
    }

    pub fn is_expired(&self, ttl_secs: u64, now_ms: u64) -> bool {
        policy::is_expired(self.last_accessed_ms(), ttl_secs, now_ms)
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub fn len(&self) -> usize {
        self.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().instances.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().instances.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Result<Option<H>> {
        let state = self.lock();
        if state.destroyed {
            return Err(Error::ScopeDestroyed(self.id));
        }
        Ok(state.instances.get(name).map(|i| i.handle.clone()))
    }

    pub(crate) fn insert_if_absent(&self, name: &str, instance: ManagedInstance<H, C>) -> Insert<H, C> {
        let mut state = self.lock();
        if state.destroyed {
            return Insert::Closed(instance);
        }
        if let Some(existing) = state.instances.get(name) {
            return Insert::Lost {
                existing: existing.handle.clone(),
                rejected: instance,
            };
        }
        let handle = instance.handle.clone();
        state.instances.insert(name.to_string(), instance);
        Insert::Stored(handle)
    }

    pub(crate) fn take(&self, name: &str) -> Result<Option<ManagedInstance<H, C>>> {
        let mut state = self.lock();
        if state.destroyed {
            return Err(Error::ScopeDestroyed(self.id));
        }
        Ok(state.instances.remove(name))
    }

    /// Mark the bucket destroyed and take every instance out of it.
    ///
    /// Returns `None` when destruction already started elsewhere, which is
    /// what makes teardown exactly-once.
    pub(crate) fn drain(&self) -> Option<Drained<H, C>> {
        let mut state = self.lock();
        if state.destroyed {
            return None;
        }
        state.destroyed = true;
        Some(state.instances.drain().collect())
    }

    fn lock(&self) -> MutexGuard<'_, BucketState<H, C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H, C> std::fmt::Debug for ResourceBucket<H, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBucket")
            .field("id", &self.id)
            .field("last_accessed_ms", &self.last_accessed_ms.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
