use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::DbError;
use crate::worker::single_thread::Job;
use crate::worker::Worker;

/// Opaque key marking the current task as pinned to a worker.
///
/// Cloning is cheap; every clone targets the same worker. A handle obtained
/// from the pass-through dispatcher executes closures inline on the caller's
/// thread instead.
#[derive(Clone)]
pub struct DispatchHandle {
    target: Target,
}

#[derive(Clone)]
enum Target {
    Worker(Arc<Worker>),
    CallerThread,
}

impl DispatchHandle {
    pub(crate) fn pinned(worker: Arc<Worker>) -> Self {
        Self {
            target: Target::Worker(worker),
        }
    }

    pub(crate) fn inline() -> Self {
        Self {
            target: Target::CallerThread,
        }
    }

    /// Thread label of the pinned worker, if any.
    #[must_use]
    pub fn worker_label(&self) -> Option<&str> {
        match &self.target {
            Target::Worker(worker) => Some(worker.label()),
            Target::CallerThread => None,
        }
    }

    /// Run a synchronous closure on the pinned worker thread and await its
    /// result. Inline handles run the closure on the calling thread.
    ///
    /// # Errors
    /// Propagates the closure's error, `DbError::PoolClosed` when the worker
    /// was shut down, or `DbError::Connection` when the worker thread went
    /// away mid-call.
    pub async fn execute<F, R>(&self, func: F) -> Result<R, DbError>
    where
        F: FnOnce() -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        match &self.target {
            Target::CallerThread => func(),
            Target::Worker(worker) => {
                let (tx, rx) = oneshot::channel();
                let job: Job = Box::new(move || {
                    let _ = tx.send(func());
                });
                worker.submit(job)?;
                rx.await.map_err(|_| {
                    DbError::Connection("worker dropped while executing a dispatched call".into())
                })?
            }
        }
    }
}

impl fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Worker(worker) => f.debug_tuple("DispatchHandle").field(worker).finish(),
            Target::CallerThread => f.debug_tuple("DispatchHandle").field(&"inline").finish(),
        }
    }
}
