//! Delegation path for async-native sources.

use std::future::Future;
use std::sync::Arc;

use crate::error::{DbError, PUBLISHER_SENTINEL};
use crate::session::{BlockingQuerySource, ReactiveQuerySource, TransactionOptions};

use super::TransactionManager;

/// Facade counterpart for sources with their own async transaction
/// primitive. No worker affinity is involved; the source manages its
/// connections itself and this layer only bridges options and errors.
pub struct ReactiveTransactionManager<R: ReactiveQuerySource> {
    source: Arc<R>,
}

impl<R: ReactiveQuerySource> ReactiveTransactionManager<R> {
    #[must_use]
    pub fn new(source: Arc<R>) -> Self {
        Self { source }
    }

    /// Run `body` inside a transaction owned by the source.
    ///
    /// Isolation is forwarded; read-only is not supported on this path and
    /// is dropped with a diagnostic. Errors from the source's primitive are
    /// wrapped by the bridge and normalized before they surface.
    ///
    /// # Errors
    /// Whatever the source's transaction primitive returns.
    pub async fn transaction<T, F, Fut>(
        &self,
        mut options: TransactionOptions,
        body: F,
    ) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(R::Session) -> Fut + Send,
        Fut: Future<Output = Result<T, DbError>> + Send,
    {
        if options.read_only {
            tracing::warn!("read-only transactions are not supported on the async path; ignoring");
            options.read_only = false;
        }
        match self.source.in_transaction(options, body).await {
            Ok(value) => Ok(value),
            Err(err) => {
                Err(DbError::data_access(PUBLISHER_SENTINEL, Some(err)).normalize())
            }
        }
    }
}

/// Which kind of source a router ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Blocking,
    Reactive,
}

/// Facade entry point over either source kind.
///
/// The mode decision is a one-bit check made at construction: blocking
/// sources get the sticky dispatcher, async-native sources bypass it.
pub enum TransactionRouter<B: BlockingQuerySource, R: ReactiveQuerySource> {
    Blocking(TransactionManager<B>),
    Reactive(ReactiveTransactionManager<R>),
}

impl<B: BlockingQuerySource, R: ReactiveQuerySource> TransactionRouter<B, R> {
    #[must_use]
    pub fn mode(&self) -> SourceMode {
        match self {
            TransactionRouter::Blocking(_) => SourceMode::Blocking,
            TransactionRouter::Reactive(_) => SourceMode::Reactive,
        }
    }

    /// Close the dispatcher on the blocking path; no-op for reactive.
    pub fn close(&self) {
        if let TransactionRouter::Blocking(manager) = self {
            manager.dispatcher().close();
        }
    }
}

impl<B: BlockingQuerySource, R: ReactiveQuerySource> From<TransactionManager<B>>
    for TransactionRouter<B, R>
{
    fn from(manager: TransactionManager<B>) -> Self {
        TransactionRouter::Blocking(manager)
    }
}

impl<B: BlockingQuerySource, R: ReactiveQuerySource> From<ReactiveTransactionManager<R>>
    for TransactionRouter<B, R>
{
    fn from(manager: ReactiveTransactionManager<R>) -> Self {
        TransactionRouter::Reactive(manager)
    }
}
