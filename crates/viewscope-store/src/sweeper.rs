//! Optional background expiry sweep.
//!
//! Lookups already expire stale buckets lazily; the sweeper only makes sure
//! scopes that are never looked up again still get destroyed. It holds a weak
//! reference, so it never keeps a store alive on its own.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use viewscope_core::{Clock, Destroyer};

use crate::store::ScopedResourceStore;

pub struct Sweeper {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `store` every `interval` on a dedicated thread.
    pub fn spawn<D, K>(store: &Arc<ScopedResourceStore<D, K>>, interval: Duration) -> io::Result<Self>
    where
        D: Destroyer,
        K: Clock,
    {
        let weak: Weak<ScopedResourceStore<D, K>> = Arc::downgrade(store);
        let (stop, stopped) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("viewscope-sweeper".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(store) = weak.upgrade() else { break };
                        let _report = store.destroy_expired();
                        #[cfg(feature = "tracing")]
                        if _report.scopes > 0 {
                            tracing::info!(
                                scopes = _report.scopes,
                                instances = _report.instances,
                                failures = _report.failures.len(),
                                "swept expired scopes"
                            );
                        }
                    }
                    // Explicit stop, or the owning `Sweeper` was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    /// Start a sweeper if the store's config sets `sweep_interval_secs`.
    pub fn from_config<D, K>(store: &Arc<ScopedResourceStore<D, K>>) -> io::Result<Option<Self>>
    where
        D: Destroyer,
        K: Clock,
    {
        match store.config().sweep_interval_secs {
            Some(secs) => Self::spawn(store, Duration::from_secs(secs)).map(Some),
            None => Ok(None),
        }
    }

    /// Stop the worker and wait for an in-flight sweep to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
