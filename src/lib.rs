/*!
 * SQL Affinity - thread-sticky dispatching for blocking SQL libraries
 *
 * This crate makes a blocking, connection-pool-based SQL library safe to
 * drive from tokio. A bounded pool of single-thread workers is handed out to
 * tasks; once a task is pinned to a worker, every database call it makes,
 * from begin to commit or rollback, runs on that one OS thread even when the
 * task suspends in between. Without that discipline a connection checked out
 * by a transaction is liable to be touched from a different thread after an
 * await, which thread-bound drivers and pools answer with deadlocks.
 *
 * # Features
 *
 * - Bounded worker pool with suspending acquire, LIFO/FIFO handout, and
 *   idle-timeout thread culling
 * - Sticky dispatcher: nested dispatches reuse the task's pinned worker
 * - Acquire timeout and threshold events with pluggable listeners
 * - Async transaction facade with record helpers over any blocking source
 * - Pass-through delegation for async-native sources
 * - Capacity derivation from the backing connection pool's configuration
 *
 * # Example
 *
 * ```rust,no_run
 * use std::sync::Arc;
 * use sql_affinity::prelude::*;
 * use sql_affinity::sqlite::SqliteSource;
 *
 * async fn example() -> Result<(), DbError> {
 *     let source = Arc::new(SqliteSource::builder("app.db".into()).build());
 *     let dispatcher = Arc::new(DispatcherSettings::builder()
 *         .pool_size(4)
 *         .finish()
 *         .build_dispatcher("app-db"));
 *     let manager = TransactionManager::new(source, dispatcher);
 *
 *     let names = manager
 *         .transaction(TransactionOptions::default(), |tx| async move {
 *             tx.execute("INSERT INTO users (name) VALUES (?)",
 *                        vec![SqlValue::Text("john".into())]).await?;
 *             let rows = tx.query("SELECT name FROM users", vec![]).await?;
 *             Ok(rows.into_rows().len())
 *         })
 *         .await?;
 *     assert_eq!(names, 1);
 *     Ok(())
 * }
 * ```
 */

#![forbid(unsafe_code)]

// Core modules
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod metadata;
pub mod records;
pub mod results;
pub mod session;
pub mod transaction;
pub mod worker;

// Reference blocking source
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export everything that should be part of the public API
pub mod prelude {
    //! Convenient imports for common functionality.

    pub use crate::config::{DispatcherSettings, DispatcherSettingsBuilder};
    pub use crate::dispatch::{DispatchHandle, Dispatcher, StickyDispatcher};
    pub use crate::error::DbError;
    pub use crate::events::{AcquisitionEvent, AcquisitionListener};
    pub use crate::records::{ChangeFlags, ColumnDef, TableRecord};
    pub use crate::results::{FromSqlValue, ResultSet, Row, SqlValue};
    pub use crate::session::{
        BlockingQuerySource, BlockingSession, IsolationLevel, ReactiveQuerySource,
        TransactionOptions,
    };
    pub use crate::transaction::{TransactionManager, TransactionRouter, TxScope};
    pub use crate::worker::{HandoutOrder, WorkerPool};
}

// Direct exports of frequently used types for simplicity
pub use config::{DispatcherSettings, DispatcherSettingsBuilder, ResolvedSettings};
pub use dispatch::{DispatchHandle, Dispatcher, PassthroughDispatcher, StickyDispatcher};
pub use error::DbError;
pub use events::{AcquisitionEvent, AcquisitionListener, LoggingListener};
pub use metadata::{derive_capacities, PoolCapacities, PoolIntrospection};
pub use records::{ChangeFlags, ColumnDef, TableRecord};
pub use results::{ColumnSet, FromSqlValue, ResultSet, Row, SqlValue};
pub use session::{
    BlockingQuerySource, BlockingSession, IsolationLevel, ReactiveQuerySource, TransactionOptions,
};
pub use transaction::{
    ReactiveTransactionManager, SourceMode, TransactionManager, TransactionRouter, TxScope,
};
pub use worker::{HandoutOrder, TryAcquire, Worker, WorkerPool};
