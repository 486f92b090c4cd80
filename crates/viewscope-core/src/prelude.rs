//! Convenient re-exports for downstream crates.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{CapacityResolver, ConfigSource, EnvSource, MapSource, StoreConfig};
pub use crate::destroy::{Destroyer, ManagedInstance};
pub use crate::error::{ConfigError, DestructionError, Error, Result};
pub use crate::id::ScopeId;
