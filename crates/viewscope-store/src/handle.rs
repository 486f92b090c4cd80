//! Caller-facing access to one live bucket.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use viewscope_core::{Destroyer, Error, ManagedInstance, Result, ScopeId};

use crate::bucket::{Insert, ResourceBucket};
use crate::destruction::{DestructionCoordinator, DestructionReport};

/// Handle to the bucket of one scope, returned by
/// `ScopedResourceStore::get_or_create_bucket`.
///
/// Handles stay valid to hold after the bucket is torn down, but every
/// operation on them then fails with `Error::ScopeDestroyed`.
pub struct BucketHandle<D: Destroyer> {
    bucket: Arc<ResourceBucket<D::Handle, D::Context>>,
    coordinator: DestructionCoordinator<D>,
}

impl<D: Destroyer> Clone for BucketHandle<D> {
    fn clone(&self) -> Self {
        Self {
            bucket: Arc::clone(&self.bucket),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<D: Destroyer> BucketHandle<D> {
    pub(crate) fn new(
        bucket: Arc<ResourceBucket<D::Handle, D::Context>>,
        coordinator: DestructionCoordinator<D>,
    ) -> Self {
        Self {
            bucket,
            coordinator,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.bucket.id()
    }

    pub fn bucket(&self) -> &ResourceBucket<D::Handle, D::Context> {
        &self.bucket
    }

    /// True when both handles point at the very same bucket instance.
    pub fn same_bucket(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bucket, &other.bucket)
    }

    pub fn is_destroyed(&self) -> bool {
        self.bucket.is_destroyed()
    }

    pub fn get(&self, name: &str) -> Result<Option<D::Handle>> {
        self.bucket.get(name)
    }

    pub fn get_or_insert_with<F>(&self, name: &str, create: F) -> Result<D::Handle>
    where
        F: FnOnce() -> (D::Handle, D::Context),
    {
        self.try_get_or_insert_with(name, || Ok::<_, Infallible>(create()))
    }

    /// Return the instance stored under `name`, creating it with `create` if
    /// absent.
    ///
    /// `create` runs without any lock held, so it may itself use the store. If
    /// another caller stores the same name in the meantime, that instance wins
    /// and ours is destroyed. If the bucket is torn down in the meantime, ours
    /// is destroyed and `ScopeDestroyed` is returned.
    pub fn try_get_or_insert_with<F, E>(&self, name: &str, create: F) -> Result<D::Handle>
    where
        F: FnOnce() -> std::result::Result<(D::Handle, D::Context), E>,
        E: Display,
    {
        if let Some(existing) = self.bucket.get(name)? {
            return Ok(existing);
        }

        let (handle, context) = create().map_err(|e| Error::Factory {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        match self
            .bucket
            .insert_if_absent(name, ManagedInstance::new(handle, context))
        {
            Insert::Stored(handle) => Ok(handle),
            Insert::Lost { existing, rejected } => {
                // Failure is already logged and counted by the coordinator.
                let _ = self.coordinator.destroy_instance(self.id(), name, rejected);
                Ok(existing)
            }
            Insert::Closed(rejected) => {
                let _ = self.coordinator.destroy_instance(self.id(), name, rejected);
                Err(Error::ScopeDestroyed(self.id()))
            }
        }
    }

    /// Remove and destroy a single named instance. Missing names are a no-op.
    pub fn destroy_instance(&self, name: &str) -> Result<DestructionReport> {
        let mut report = DestructionReport::default();
        if let Some(instance) = self.bucket.take(name)? {
            report.instances = 1;
            if let Err(e) = self.coordinator.destroy_instance(self.id(), name, instance) {
                report.failures.push((self.id(), e));
            }
        }
        Ok(report)
    }
}

impl<D: Destroyer> std::fmt::Debug for BucketHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketHandle")
            .field("bucket", &self.bucket)
            .finish()
    }
}
