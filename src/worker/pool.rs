use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, TryAcquireError};

use super::single_thread::Worker;

/// Ordering discipline for handing released workers back out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoutOrder {
    /// Stack order: a released worker is the next one handed out. Favors
    /// cache and thread warmth.
    #[default]
    Lifo,
    /// Queue order: workers rotate evenly. Pairs well with idle-timeout
    /// thread culling.
    Fifo,
}

/// Outcome of a non-blocking acquire attempt.
#[derive(Debug)]
pub enum TryAcquire {
    /// A worker was available.
    Ready(Arc<Worker>),
    /// No token is ready right now.
    Empty,
    /// The pool is closed.
    Closed,
}

/// Bounded pool of single-thread workers with suspending acquire.
///
/// Capacity lives in a token semaphore; handout ordering lives in a deque of
/// worker handles. The two are deliberately separate: a token is the permit
/// to take one handle, so `held + idle == capacity` at all times outside of
/// shutdown.
pub struct WorkerPool {
    name: String,
    capacity: usize,
    tokens: Semaphore,
    idle: Mutex<IdleQueue>,
    order: HandoutOrder,
}

struct IdleQueue {
    queue: VecDeque<Arc<Worker>>,
    closed: bool,
}

impl WorkerPool {
    /// Create a pool of `capacity` workers, each culling its thread after
    /// `idle_timeout` without work.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        idle_timeout: Duration,
        order: HandoutOrder,
    ) -> Self {
        let name = name.into();
        let queue = (0..capacity)
            .map(|id| Worker::new(&name, id, idle_timeout))
            .collect();
        Self {
            capacity,
            tokens: Semaphore::new(capacity),
            idle: Mutex::new(IdleQueue {
                queue,
                closed: false,
            }),
            order,
            name,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tokens.is_closed()
    }

    /// Workers currently idle in the pool.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().queue.len()
    }

    /// Take a worker, suspending until one is available.
    ///
    /// Returns `None` when the pool closes before (or while) waiting.
    pub async fn acquire(&self) -> Option<Arc<Worker>> {
        let permit = self.tokens.acquire().await.ok()?;
        permit.forget();
        self.pop_idle()
    }

    /// Non-blocking acquire attempt.
    #[must_use]
    pub fn try_acquire(&self) -> TryAcquire {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                match self.pop_idle() {
                    Some(worker) => TryAcquire::Ready(worker),
                    None => TryAcquire::Empty,
                }
            }
            Err(TryAcquireError::NoPermits) => TryAcquire::Empty,
            Err(TryAcquireError::Closed) => TryAcquire::Closed,
        }
    }

    fn pop_idle(&self) -> Option<Arc<Worker>> {
        let worker = self.idle.lock().queue.pop_front();
        if worker.is_none() {
            // Token and handle counts always match; hand the token back if
            // they ever diverge during shutdown.
            self.tokens.add_permits(1);
        }
        worker
    }

    /// Return a worker to the pool. Callable from any thread.
    ///
    /// After [`WorkerPool::close`] the worker is shut down instead of being
    /// re-queued.
    pub fn release(&self, worker: Arc<Worker>) {
        {
            let mut idle = self.idle.lock();
            if idle.closed {
                drop(idle);
                worker.close();
                return;
            }
            match self.order {
                HandoutOrder::Lifo => idle.queue.push_front(worker),
                HandoutOrder::Fifo => idle.queue.push_back(worker),
            }
        }
        self.tokens.add_permits(1);
    }

    /// Close the pool: wake every pending acquire with `None`, then shut
    /// down each idle worker exactly once. Idempotent.
    pub fn close(&self) {
        self.tokens.close();
        let drained: Vec<Arc<Worker>> = {
            let mut idle = self.idle.lock();
            if idle.closed {
                return;
            }
            idle.closed = true;
            idle.queue.drain(..).collect()
        };
        for worker in &drained {
            worker.close();
        }
        tracing::debug!(pool = %self.name, drained = drained.len(), "worker pool closed");
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("order", &self.order)
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
