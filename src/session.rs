//! Contracts the dispatcher and transaction facade consume.

use std::future::Future;

use serde::Deserialize;

use crate::error::DbError;
use crate::results::{ResultSet, SqlValue};

/// Standard transaction isolation levels, forwarded to the session before
/// any user code runs. Each session maps the level to whatever its driver
/// natively supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The level as it is spelled in SQL.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Per-transaction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionOptions {
    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// One synchronous conversation with the database.
///
/// Every method blocks the calling thread; the facade only ever invokes them
/// from a pinned worker thread. From `begin` to `commit`/`rollback` the
/// session must stay on that one thread, which is exactly what the sticky
/// dispatcher guarantees.
pub trait BlockingSession: Send + 'static {
    /// Start a transaction.
    ///
    /// # Errors
    /// Driver errors.
    fn begin(&mut self) -> Result<(), DbError>;

    /// Commit the open transaction.
    ///
    /// # Errors
    /// Driver errors.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Roll the open transaction back.
    ///
    /// # Errors
    /// Driver errors.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Configure the isolation level on the native connection.
    ///
    /// # Errors
    /// Driver errors.
    fn set_isolation(&mut self, isolation: IsolationLevel) -> Result<(), DbError>;

    /// Flag the native connection read-only.
    ///
    /// # Errors
    /// Driver errors.
    fn set_read_only(&mut self, read_only: bool) -> Result<(), DbError>;

    /// Run a DML statement, returning the number of affected rows.
    ///
    /// # Errors
    /// Driver errors.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    /// Run a query, returning its rows.
    ///
    /// # Errors
    /// Driver errors.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DbError>;
}

/// A blocking SQL library that can open short-lived sessions.
pub trait BlockingQuerySource: Send + Sync + 'static {
    type Session: BlockingSession;

    /// Open a fresh session.
    ///
    /// # Errors
    /// Driver errors.
    fn open_session(&self) -> Result<Self::Session, DbError>;
}

/// An async-native SQL library with its own transaction primitive.
///
/// Sources of this kind need no worker affinity; the facade delegates to
/// them directly and only bridges errors.
pub trait ReactiveQuerySource: Send + Sync {
    type Session: Send;

    /// Run `body` inside a transaction owned by the source, resolving once
    /// with the body's result.
    fn in_transaction<T, F, Fut>(
        &self,
        options: TransactionOptions,
        body: F,
    ) -> impl Future<Output = Result<T, DbError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(Self::Session) -> Fut + Send,
        Fut: Future<Output = Result<T, DbError>> + Send;
}
