#![forbid(unsafe_code)]
//! viewscope-core: shared vocabulary for the scoped resource store.
//!
//! Holds the pieces every other crate needs without pulling in the store
//! itself: strongly-typed scope ids, the error taxonomy, configuration and its
//! resolution from external settings, the clock abstraction, and the
//! `Destroyer` interface implemented by the container that owns instances.

pub mod clock;
pub mod config;
pub mod destroy;
pub mod error;
pub mod id;
pub mod prelude;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CapacityResolver, ConfigSource, EnvSource, MapSource, StoreConfig};
pub use destroy::{Destroyer, ManagedInstance};
pub use error::{ConfigError, DestructionError, Error, Result};
pub use id::ScopeId;
