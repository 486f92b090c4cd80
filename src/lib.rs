#![forbid(unsafe_code)]
//! viewscope: per-session scoped resource store.
//!
//! Facade over the workspace crates. Request-handling code typically:
//!
//! 1. resolves a `StoreConfig` once at startup (`StoreConfig::from_env`),
//! 2. builds one `ScopedResourceStore` per session around the container's
//!    `Destroyer`,
//! 3. calls `get_or_create_bucket` with the current view's `ScopeId` on every
//!    request, `remove` when a view is known to be finished, and
//!    `destroy_expired` (or a `Sweeper`) to reap idle views.

pub use viewscope_core as core;
pub use viewscope_store as store;

pub mod prelude {
    pub use viewscope_core::prelude::*;
    pub use viewscope_store::{
        BucketHandle, DestructionCoordinator, DestructionReport, EvictionPolicy, ResourceBucket,
        ScopedResourceStore, StatsSnapshot, Sweeper,
    };
}
