//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use viewscope::prelude::*;

static NEXT_RESOURCE: AtomicU64 = AtomicU64::new(1);

/// Stand-in for a container-managed bean.
#[derive(Debug)]
pub struct Resource {
    pub serial: u64,
    pub name: String,
}

/// Create a resource with a process-unique serial, plus its creation context.
pub fn make(name: &str) -> (Arc<Resource>, u64) {
    let serial = NEXT_RESOURCE.fetch_add(1, Ordering::Relaxed);
    (
        Arc::new(Resource {
            serial,
            name: name.to_string(),
        }),
        serial,
    )
}

/// Destroyer that records every call and fails for selected names.
#[derive(Default)]
pub struct RecordingDestroyer {
    calls: Mutex<Vec<(String, u64)>>,
    failing: HashSet<String>,
}

impl RecordingDestroyer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// (name, serial) of every destroy call so far.
    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// How many times each serial was destroyed.
    pub fn per_serial(&self) -> HashMap<u64, usize> {
        let mut counts = HashMap::new();
        for (_, serial) in self.calls.lock().unwrap().iter() {
            *counts.entry(*serial).or_insert(0) += 1;
        }
        counts
    }
}

impl Destroyer for RecordingDestroyer {
    type Handle = Arc<Resource>;
    type Context = u64;

    fn destroy_instance(
        &self,
        name: &str,
        handle: Arc<Resource>,
        context: u64,
    ) -> std::result::Result<(), DestructionError> {
        assert_eq!(handle.serial, context, "context must travel with its handle");
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), handle.serial));
        if self.failing.contains(name) {
            return Err(DestructionError::new(name, "simulated container failure"));
        }
        Ok(())
    }
}

pub type TestStore = ScopedResourceStore<RecordingDestroyer, ManualClock>;

pub fn store_with(
    max_active: usize,
    ttl_secs: u64,
    destroyer: RecordingDestroyer,
) -> (TestStore, ManualClock) {
    let clock = ManualClock::new(1_000_000);
    let store = ScopedResourceStore::with_clock(
        StoreConfig::new(max_active, ttl_secs),
        destroyer,
        clock.clone(),
    )
    .expect("valid config");
    (store, clock)
}

pub fn store(max_active: usize, ttl_secs: u64) -> (TestStore, ManualClock) {
    store_with(max_active, ttl_secs, RecordingDestroyer::new())
}

pub fn sid(v: u64) -> ScopeId {
    ScopeId::new(v)
}
