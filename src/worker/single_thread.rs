use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::DbError;

/// A unit of work shipped to a worker thread.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-thread execution context.
///
/// The worker owns at most one OS thread draining a FIFO job queue. The
/// thread exits after `idle_timeout` without work and is respawned lazily on
/// the next submit, so an idle pool holds no threads. The handle itself is
/// created eagerly by the pool and lives until pool shutdown.
pub struct Worker {
    id: usize,
    label: String,
    idle_timeout: Duration,
    closed: AtomicBool,
    slot: Mutex<Slot>,
}

// The generation ties a thread to the sender it serves, so a thread that
// lingered past its timeout never retires a newer thread's sender.
struct Slot {
    generation: u64,
    sender: Option<Sender<Job>>,
}

impl Worker {
    pub(crate) fn new(pool_name: &str, id: usize, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            label: format!("{pool_name}-worker-{id}"),
            idle_timeout,
            closed: AtomicBool::new(false),
            slot: Mutex::new(Slot {
                generation: 0,
                sender: None,
            }),
        })
    }

    /// Stable identity within the owning pool.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Thread name used for this worker.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a job on this worker's thread, spawning it if necessary.
    ///
    /// # Errors
    /// Returns `DbError::PoolClosed` after [`Worker::close`], or
    /// `DbError::Connection` if the OS refuses to spawn a thread.
    pub(crate) fn submit(self: &Arc<Self>, job: Job) -> Result<(), DbError> {
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }
        let mut slot = self.slot.lock();
        let mut job = job;
        if let Some(sender) = &slot.sender {
            match sender.send(job) {
                Ok(()) => return Ok(()),
                // The thread hit its idle timeout and exited; respawn below.
                Err(mpsc::SendError(returned)) => job = returned,
            }
        }
        let (sender, receiver) = mpsc::channel::<Job>();
        slot.generation += 1;
        self.spawn_thread(slot.generation, receiver)?;
        sender.send(job).map_err(|_| {
            DbError::Connection(format!(
                "worker thread {} exited before accepting work",
                self.label
            ))
        })?;
        slot.sender = Some(sender);
        Ok(())
    }

    fn spawn_thread(self: &Arc<Self>, generation: u64, receiver: Receiver<Job>) -> Result<(), DbError> {
        let worker = Arc::clone(self);
        let handle = tokio::runtime::Handle::try_current().ok();
        thread::Builder::new()
            .name(self.label.clone())
            .spawn(move || {
                let runtime_guard = handle.as_ref().map(|h| h.enter());
                worker.run_loop(generation, &receiver);
                drop(runtime_guard);
            })
            .map_err(|err| {
                DbError::Connection(format!(
                    "failed to spawn worker thread {}: {err}",
                    self.label
                ))
            })?;
        Ok(())
    }

    fn run_loop(&self, generation: u64, receiver: &Receiver<Job>) {
        tracing::debug!(worker = %self.label, "worker thread started");
        loop {
            match receiver.recv_timeout(self.idle_timeout) {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => {
                    // A submit may have raced the timeout; check the queue one
                    // last time under the slot lock before retiring the sender.
                    let mut slot = self.slot.lock();
                    match receiver.try_recv() {
                        Ok(job) => {
                            drop(slot);
                            job();
                        }
                        Err(_) => {
                            if slot.generation == generation {
                                slot.sender = None;
                            }
                            tracing::debug!(worker = %self.label, "worker thread idle, exiting");
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!(worker = %self.label, "worker thread shut down");
                    return;
                }
            }
        }
    }

    /// Mark the worker closed and let its thread wind down.
    ///
    /// Jobs already queued still run; the thread exits once the queue drains.
    /// Idempotent.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slot.lock().sender = None;
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("idle_timeout", &self.idle_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    fn run_on<T: Send + 'static>(
        worker: &Arc<Worker>,
        func: impl FnOnce() -> T + Send + 'static,
    ) -> T {
        let (tx, rx) = mpsc::channel();
        worker
            .submit(Box::new(move || {
                let _ = tx.send(func());
            }))
            .expect("submit");
        rx.recv_timeout(Duration::from_secs(5)).expect("worker reply")
    }

    #[test]
    fn jobs_run_in_order_on_one_thread() {
        let worker = Worker::new("test-pool", 0, Duration::from_secs(30));
        let first = run_on(&worker, || std::thread::current().id());
        let second = run_on(&worker, || std::thread::current().id());
        assert_eq!(first, second);
    }

    #[test]
    fn thread_respawns_after_idle_timeout() {
        let worker = Worker::new("test-pool", 0, Duration::from_millis(20));
        let first = run_on(&worker, || std::thread::current().id());
        std::thread::sleep(Duration::from_millis(120));
        let second = run_on(&worker, || std::thread::current().id());
        assert_ne!(first, second, "idle thread should have been culled");
    }

    #[test]
    fn submit_after_close_is_rejected() {
        let worker = Worker::new("test-pool", 0, Duration::from_secs(30));
        run_on(&worker, || ());
        worker.close();
        let result = worker.submit(Box::new(|| {}));
        assert!(matches!(result, Err(DbError::PoolClosed)));
    }
}
