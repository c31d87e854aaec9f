//! Background Tasks
//!
//! Bounded pool for fire-and-forget work: blob deletion, claim consumption,
//! last-message bookkeeping. Submitting never blocks the caller; a task that
//! cannot get a permit waits inside its own spawned future.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::infrastructure::metrics;

/// Handle to the background pool. Cheap to clone.
#[derive(Clone)]
pub struct BackgroundTasks {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl BackgroundTasks {
    /// Create a pool allowing at most `max_in_flight` tasks to run at once.
    pub fn new(max_in_flight: usize) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Submit a task. Failures are logged under `task` and never surfaced.
    ///
    /// The returned handle may be dropped; tests await it to observe completion.
    pub fn spawn<F, E>(&self, task: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = fut.await {
                tracing::warn!(task, error = %e, "Background task failed");
                metrics::record_background_failure(task);
            }
        })
    }

    /// Number of permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks holding a permit right now.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new(256)
    }
}
