//! Destruction of bucket contents through the container's `Destroyer`.
//!
//! Teardown is best effort and total: every drained instance gets exactly one
//! destroy call, failures (including panics inside the callback) are recorded,
//! and one bad instance never stops the rest from being destroyed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use viewscope_core::{DestructionError, Destroyer, ManagedInstance, ScopeId};

use crate::bucket::{Drained, ResourceBucket};
use crate::tracking::StoreStats;

/// Outcome of one or more bucket teardowns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestructionReport {
    /// Buckets torn down by this operation.
    pub scopes: usize,
    /// Destroy callbacks invoked, successful or not.
    pub instances: usize,
    pub failures: Vec<(ScopeId, DestructionError)>,
}

impl DestructionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn destroyed_ok(&self) -> usize {
        self.instances - self.failures.len()
    }

    pub fn merge(&mut self, other: DestructionReport) {
        self.scopes += other.scopes;
        self.instances += other.instances;
        self.failures.extend(other.failures);
    }
}

pub struct DestructionCoordinator<D> {
    destroyer: Arc<D>,
    stats: Arc<StoreStats>,
}

impl<D> Clone for DestructionCoordinator<D> {
    fn clone(&self) -> Self {
        Self {
            destroyer: Arc::clone(&self.destroyer),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<D: Destroyer> DestructionCoordinator<D> {
    pub fn new(destroyer: Arc<D>) -> Self {
        Self::with_stats(destroyer, Arc::new(StoreStats::new()))
    }

    pub fn with_stats(destroyer: Arc<D>, stats: Arc<StoreStats>) -> Self {
        Self { destroyer, stats }
    }

    pub fn destroyer(&self) -> &D {
        &self.destroyer
    }

    /// Destroy every instance in `bucket` and clear it.
    ///
    /// A bucket whose destruction already began yields an empty report.
    pub fn destroy(&self, bucket: &ResourceBucket<D::Handle, D::Context>) -> DestructionReport {
        match bucket.drain() {
            Some(drained) => self.dispose(bucket.id(), drained),
            None => DestructionReport::default(),
        }
    }

    /// Destroy instances already drained from the bucket of `scope`.
    pub(crate) fn dispose(
        &self,
        scope: ScopeId,
        drained: Drained<D::Handle, D::Context>,
    ) -> DestructionReport {
        let mut report = DestructionReport {
            scopes: 1,
            ..Default::default()
        };
        for (name, instance) in drained {
            report.instances += 1;
            if let Err(e) = self.destroy_instance(scope, &name, instance) {
                report.failures.push((scope, e));
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            scope = %scope,
            instances = report.instances,
            failures = report.failures.len(),
            "destroyed scope bucket"
        );
        report
    }

    /// Destroy a single instance that is no longer reachable from any bucket.
    pub fn destroy_instance(
        &self,
        scope: ScopeId,
        name: &str,
        instance: ManagedInstance<D::Handle, D::Context>,
    ) -> Result<(), DestructionError> {
        let ManagedInstance { handle, context } = instance;
        let destroyer = &self.destroyer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            destroyer.destroy_instance(name, handle, context)
        }))
        .unwrap_or_else(|payload| Err(DestructionError::new(name, panic_message(&*payload))));

        self.stats.record_destroyed(outcome.is_ok());
        if let Err(_e) = &outcome {
            #[cfg(feature = "tracing")]
            tracing::warn!(scope = %scope, instance = name, error = %_e, "instance destruction failed");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = scope;
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("destroy callback panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("destroy callback panicked: {s}")
    } else {
        "destroy callback panicked".to_string()
    }
}
