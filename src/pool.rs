//! Detached callback execution
//!
//! Handler callbacks are spawned as independent tasks and never awaited by
//! the dispatch loop. A semaphore caps how many run at once; the rest wait
//! for a permit inside their own task.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::HandlerResult;

/// Bounded spawner for handler callbacks
///
/// Failure policy is log-and-drop: an `Err` from a callback is logged at
/// `warn` and nothing else happens.
#[derive(Debug, Clone)]
pub struct CallbackPool {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl CallbackPool {
    /// Create a pool allowing `max_in_flight` callbacks to execute at once
    ///
    /// The limit is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Number of callbacks currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Spawn `callback` without waiting for it
    ///
    /// The task is created immediately and only then waits for a permit, so
    /// the limit bounds executing callbacks, not queued ones. Waiting tasks
    /// are unbounded; the dispatch loop never blocks on the pool.
    pub fn spawn<F>(&self, name: &'static str, callback: F)
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            match callback.await {
                Ok(()) => debug!(callback = name, "callback finished"),
                Err(e) => warn!(callback = name, error = %e, "callback failed"),
            }
        });
    }
}
