#![forbid(unsafe_code)]
//! viewscope-store: the scoped resource lifecycle store.
//!
//! A `ScopedResourceStore` maps each view/session `ScopeId` to a bucket of
//! named managed instances. It bounds the number of live buckets (evicting the
//! least recently used), expires buckets after inactivity, and hands every
//! instance to the container's `Destroyer` exactly once, whichever of explicit
//! removal, eviction or expiry ends the scope.
//!
//! Lock order is always store map first, bucket second. Destroy callbacks and
//! instance factories never run under either lock.

pub mod bucket;
pub mod destruction;
pub mod handle;
pub mod policy;
pub mod store;
pub mod sweeper;
pub mod tracking;

pub use bucket::ResourceBucket;
pub use destruction::{DestructionCoordinator, DestructionReport};
pub use handle::BucketHandle;
pub use policy::{EvictionPolicy, RecencyKey};
pub use store::ScopedResourceStore;
pub use sweeper::Sweeper;
pub use tracking::{StatsSnapshot, StoreStats};

pub use viewscope_core::{
    Clock, ConfigError, DestructionError, Destroyer, Error, ManagedInstance, ManualClock, Result,
    ScopeId, StoreConfig, SystemClock,
};
