use std::future::Future;
use std::sync::Once;

use crate::error::DbError;

use super::handle::DispatchHandle;
use super::sticky::StickyDispatcher;

/// Conforming dispatcher for deployments without a worker pool.
///
/// `run` invokes the block with a shared inline handle on the caller's
/// thread. Affinity holds trivially, but blocking driver calls will stall
/// the runtime thread they land on, so first use emits an advisory.
#[derive(Debug)]
pub struct PassthroughDispatcher {
    advisory: Once,
}

impl Default for PassthroughDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PassthroughDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            advisory: Once::new(),
        }
    }

    /// Run `block` on the caller's thread.
    ///
    /// # Errors
    /// Whatever `block` returns.
    pub async fn run<F, Fut, T>(&self, block: F) -> Result<T, DbError>
    where
        F: FnOnce(DispatchHandle) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.advisory.call_once(|| {
            tracing::warn!(
                "no worker pool configured; blocking database calls will run on the caller's thread"
            );
        });
        block(DispatchHandle::inline()).await
    }
}

/// The dispatcher variants a transaction facade can own.
#[derive(Debug)]
pub enum Dispatcher {
    /// Thread-affinity dispatching through a worker pool.
    Sticky(StickyDispatcher),
    /// No pool configured; blocks run on the caller's thread.
    Passthrough(PassthroughDispatcher),
}

impl Dispatcher {
    /// Run `block` under this dispatcher's affinity discipline.
    ///
    /// # Errors
    /// See [`StickyDispatcher::run`] and [`PassthroughDispatcher::run`].
    pub async fn run<F, Fut, T>(&self, block: F) -> Result<T, DbError>
    where
        F: FnOnce(DispatchHandle) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        match self {
            Dispatcher::Sticky(dispatcher) => dispatcher.run(block).await,
            Dispatcher::Passthrough(dispatcher) => dispatcher.run(block).await,
        }
    }

    /// Close any owned worker pool. No-op for the pass-through variant.
    pub fn close(&self) {
        if let Dispatcher::Sticky(dispatcher) = self {
            dispatcher.close();
        }
    }

    #[must_use]
    pub fn is_sticky(&self) -> bool {
        matches!(self, Dispatcher::Sticky(_))
    }
}

impl From<StickyDispatcher> for Dispatcher {
    fn from(dispatcher: StickyDispatcher) -> Self {
        Dispatcher::Sticky(dispatcher)
    }
}

impl From<PassthroughDispatcher> for Dispatcher {
    fn from(dispatcher: PassthroughDispatcher) -> Self {
        Dispatcher::Passthrough(dispatcher)
    }
}
