use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ResolvedSettings;
use crate::error::DbError;
use crate::events::{notify_all, AcquisitionEvent};
use crate::worker::{Worker, WorkerPool};

use super::handle::DispatchHandle;

tokio::task_local! {
    /// Affinity binding of the current task. Present while the task runs
    /// inside a dispatched block; nested dispatches reuse it.
    static BINDING: DispatchHandle;
}

/// Dispatcher that pins each task to one worker for the duration of a
/// dispatched block.
///
/// The first [`run`](StickyDispatcher::run) on a task acquires a worker and
/// installs a [`DispatchHandle`] in task-local context; nested `run` calls
/// find the handle and reuse the same worker without touching the pool. This
/// is what keeps every database call of a transaction on one OS thread even
/// when the task suspends between calls.
pub struct StickyDispatcher {
    pool: Arc<WorkerPool>,
    settings: ResolvedSettings,
}

impl StickyDispatcher {
    /// Build a dispatcher and its worker pool from resolved settings.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: ResolvedSettings) -> Self {
        let pool = Arc::new(WorkerPool::new(
            name,
            settings.pool_size,
            settings.idle_timeout,
            settings.handout_order,
        ));
        Self { pool, settings }
    }

    /// Dispatcher over an existing pool.
    #[must_use]
    pub fn with_pool(pool: Arc<WorkerPool>, settings: ResolvedSettings) -> Self {
        Self { pool, settings }
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Run `block` pinned to a worker.
    ///
    /// If the task is already pinned the block runs against the existing
    /// binding. Otherwise a worker is acquired (bounded by the acquire
    /// timeout), the binding is installed for the duration of the block, and
    /// the worker is released on every exit path, including cancellation.
    ///
    /// # Errors
    /// `DbError::AcquireTimeout` when no worker frees up in time, a
    /// data-access error wrapping `DbError::PoolClosed` when the pool shut
    /// down, and whatever `block` itself returns.
    pub async fn run<F, Fut, T>(&self, block: F) -> Result<T, DbError>
    where
        F: FnOnce(DispatchHandle) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        if let Ok(handle) = BINDING.try_with(DispatchHandle::clone) {
            return block(handle).await;
        }

        let started = Instant::now();
        let worker = match tokio::time::timeout(self.settings.acquire_timeout, self.pool.acquire())
            .await
        {
            Err(_) => {
                notify_all(
                    &self.settings.listeners,
                    &AcquisitionEvent::Timeout {
                        timeout: self.settings.acquire_timeout,
                    },
                );
                return Err(DbError::AcquireTimeout {
                    timeout: self.settings.acquire_timeout,
                });
            }
            Ok(None) => {
                return Err(DbError::data_access(
                    "worker pool closed",
                    Some(DbError::PoolClosed),
                ));
            }
            Ok(Some(worker)) => worker,
        };

        let elapsed = started.elapsed();
        if let Some(threshold) = self.settings.acquire_threshold {
            if elapsed > threshold {
                notify_all(
                    &self.settings.listeners,
                    &AcquisitionEvent::ThresholdExceeded { elapsed, threshold },
                );
            }
        }

        // Releases on every exit path: normal return, error, and drop of the
        // future when the surrounding task is cancelled.
        let _release = ReleaseGuard {
            pool: Arc::clone(&self.pool),
            worker: Some(Arc::clone(&worker)),
        };
        let handle = DispatchHandle::pinned(worker);
        BINDING.scope(handle.clone(), block(handle)).await
    }

    /// Close the underlying worker pool; pending acquires resolve promptly.
    pub fn close(&self) {
        self.pool.close();
    }
}

impl fmt::Debug for StickyDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StickyDispatcher")
            .field("pool", &self.pool)
            .field("acquire_timeout", &self.settings.acquire_timeout)
            .field("acquire_threshold", &self.settings.acquire_threshold)
            .finish()
    }
}

struct ReleaseGuard {
    pool: Arc<WorkerPool>,
    worker: Option<Arc<Worker>>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.release(worker);
        }
    }
}
