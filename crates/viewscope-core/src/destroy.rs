//! Abstract destroy interface.
//!
//! The container that creates managed instances is the only party that knows
//! how to tear them down. The store keeps instances opaque and calls back into
//! the container through this trait when a scope ends.

use crate::error::DestructionError;

/// Container capability that destroys one managed instance.
///
/// Implementations must be `Send + Sync`: the store may call them from any
/// request thread or from the background sweeper. The store guarantees that
/// each live instance is handed to `destroy_instance` at most once and that no
/// store lock is held during the call.
pub trait Destroyer: Send + Sync + 'static {
    /// Handle callers get back from a bucket. Usually an `Arc<T>`.
    type Handle: Clone + Send + Sync + 'static;
    /// Creation metadata the container needs again at destroy time.
    type Context: Send + 'static;

    fn destroy_instance(
        &self,
        name: &str,
        handle: Self::Handle,
        context: Self::Context,
    ) -> Result<(), DestructionError>;
}

/// One managed instance as stored in a bucket.
#[derive(Debug, Clone)]
pub struct ManagedInstance<H, C> {
    pub handle: H,
    pub context: C,
}

impl<H, C> ManagedInstance<H, C> {
    pub fn new(handle: H, context: C) -> Self {
        Self { handle, context }
    }
}

