//! Suspension-friendly transaction facade over blocking SQL sources.

pub mod reactive;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::{DispatchHandle, Dispatcher};
use crate::error::{DbError, ROLLBACK_SENTINEL};
use crate::records::ops::{self, SqlPlan};
use crate::records::TableRecord;
use crate::results::{ResultSet, SqlValue};
use crate::session::{BlockingQuerySource, BlockingSession, TransactionOptions};

pub use reactive::{ReactiveTransactionManager, SourceMode, TransactionRouter};

type SessionCell<S> = Arc<Mutex<Option<S>>>;

/// Facade that runs transactions against a blocking source through the
/// sticky dispatcher.
///
/// Every database call of a transaction executes on the worker the task got
/// pinned to, so the source's begin/commit/rollback and all statements in
/// between observe one OS thread.
pub struct TransactionManager<S: BlockingQuerySource> {
    source: Arc<S>,
    dispatcher: Arc<Dispatcher>,
}

impl<S: BlockingQuerySource> TransactionManager<S> {
    #[must_use]
    pub fn new(source: Arc<S>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { source, dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run `body` inside a transaction.
    ///
    /// A session is opened on the pinned worker; isolation and read-only are
    /// applied before any user code; `body`'s success commits and its error
    /// rolls back. Errors are normalized before they surface, so callers see
    /// the original cause rather than the bridge wrappers.
    ///
    /// # Errors
    /// Acquire failures from the dispatcher, driver errors, and whatever
    /// `body` returns.
    pub async fn transaction<F, Fut, T>(
        &self,
        options: TransactionOptions,
        body: F,
    ) -> Result<T, DbError>
    where
        F: FnOnce(TxScope<S::Session>) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
        T: Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let result = self
            .dispatcher
            .run(move |handle| async move {
                let session = handle
                    .execute(move || {
                        let mut session = source.open_session()?;
                        if let Some(isolation) = options.isolation {
                            session.set_isolation(isolation)?;
                        }
                        if options.read_only {
                            session.set_read_only(true)?;
                        }
                        session.begin()?;
                        Ok(session)
                    })
                    .await?;
                let session: SessionCell<S::Session> = Arc::new(Mutex::new(Some(session)));
                let scope = TxScope {
                    session: Arc::clone(&session),
                    handle: handle.clone(),
                };
                match body(scope).await {
                    Ok(value) => {
                        finish_session(&handle, &session, true).await?;
                        Ok(value)
                    }
                    Err(err) => {
                        if let Err(rollback_err) = finish_session(&handle, &session, false).await {
                            tracing::warn!(error = %rollback_err, "transaction rollback failed");
                        }
                        Err(DbError::data_access(ROLLBACK_SENTINEL, Some(err)))
                    }
                }
            })
            .await;
        result.map_err(DbError::normalize)
    }
}

async fn finish_session<S: BlockingSession>(
    handle: &DispatchHandle,
    session: &SessionCell<S>,
    commit: bool,
) -> Result<(), DbError> {
    let cell = Arc::clone(session);
    handle
        .execute(move || {
            let mut guard = cell.lock();
            let mut session = guard
                .take()
                .ok_or_else(|| DbError::Execution("transaction already completed".into()))?;
            if commit {
                session.commit()
            } else {
                session.rollback()
            }
        })
        .await
}

/// Handle to an in-progress transaction.
///
/// Every operation ships its work to the worker thread the transaction is
/// pinned to and suspends until the result comes back. The scope stays valid
/// for the lifetime of the transaction body; using it after the transaction
/// completed fails with an execution error.
pub struct TxScope<S: BlockingSession> {
    session: SessionCell<S>,
    handle: DispatchHandle,
}

impl<S: BlockingSession> Clone for TxScope<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            handle: self.handle.clone(),
        }
    }
}

impl<S: BlockingSession> TxScope<S> {
    /// The dispatch handle this transaction is pinned to.
    #[must_use]
    pub fn handle(&self) -> &DispatchHandle {
        &self.handle
    }

    async fn with_session<R>(
        &self,
        func: impl FnOnce(&mut S) -> Result<R, DbError> + Send + 'static,
    ) -> Result<R, DbError>
    where
        R: Send + 'static,
    {
        let cell = Arc::clone(&self.session);
        self.handle
            .execute(move || {
                let mut guard = cell.lock();
                let session = guard
                    .as_mut()
                    .ok_or_else(|| DbError::Execution("transaction already completed".into()))?;
                func(session)
            })
            .await
    }

    /// Run a DML statement on the pinned worker.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Result<u64, DbError> {
        let sql = sql.into();
        self.with_session(move |session| session.execute(&sql, &params))
            .await
    }

    /// Run a query on the pinned worker.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn query(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Result<ResultSet, DbError> {
        let sql = sql.into();
        self.with_session(move |session| session.query(&sql, &params))
            .await
    }

    /// Insert the changed fields of `record`.
    ///
    /// Returns 0 without touching the database when nothing changed.
    /// Otherwise the server-returned row (generated keys included) is copied
    /// back into the record, all changed flags clear, and 1 is returned.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn insert<R: TableRecord>(&self, record: &mut R) -> Result<u64, DbError> {
        self.insert_inner(record, false).await
    }

    /// Like [`insert`](TxScope::insert) but returns 0 when the INSERT hit a
    /// conflict and produced no row.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn insert_on_conflict_do_nothing<R: TableRecord>(
        &self,
        record: &mut R,
    ) -> Result<u64, DbError> {
        self.insert_inner(record, true).await
    }

    async fn insert_inner<R: TableRecord>(
        &self,
        record: &mut R,
        on_conflict_do_nothing: bool,
    ) -> Result<u64, DbError> {
        let Some(SqlPlan { sql, params }) = ops::insert_plan(record, on_conflict_do_nothing)
        else {
            return Ok(0);
        };
        let result = self.query(sql, params).await?;
        match result.first_opt() {
            Some(row) => {
                ops::copy_back(record, row)?;
                Ok(1)
            }
            None if on_conflict_do_nothing => Ok(0),
            None => Err(DbError::Execution(format!(
                "insert into {} returned no row",
                R::TABLE
            ))),
        }
    }

    /// Insert every changed record in one statement, copying returned rows
    /// back positionally. Returns the number of rows inserted; 0 for an
    /// empty or fully unchanged batch.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn insert_all<R: TableRecord>(&self, records: &mut [R]) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }
        let Some(SqlPlan { sql, params }) = ops::insert_all_plan(records) else {
            return Ok(0);
        };
        let result = self.query(sql, params).await?;
        for (record, row) in records.iter_mut().zip(result.rows.iter()) {
            ops::copy_back(record, row)?;
        }
        Ok(result.rows.len() as u64)
    }

    /// Update the row matching `record`'s primary key with its changed
    /// fields. Returns 0 when nothing changed, otherwise the affected count
    /// (0 or 1) with changed flags cleared.
    ///
    /// # Errors
    /// Driver errors, or an execution error for a keyless table.
    pub async fn update<R: TableRecord>(&self, record: &mut R) -> Result<u64, DbError> {
        let Some(SqlPlan { sql, params }) = ops::update_plan(record)? else {
            return Ok(0);
        };
        let affected = self.execute(sql, params).await?;
        ops::clear_changed(record);
        Ok(affected.min(1))
    }

    /// Insert or update depending on the primary-key state: a key field that
    /// is marked changed, or NULL in a non-nullable column, means insert.
    ///
    /// # Errors
    /// Driver errors.
    pub async fn store<R: TableRecord>(&self, record: &mut R) -> Result<u64, DbError> {
        if ops::needs_insert(record) {
            self.insert(record).await
        } else {
            self.update(record).await
        }
    }

    /// Delete the row matching `record`'s primary key.
    ///
    /// # Errors
    /// Driver errors, or an execution error for a keyless table.
    pub async fn delete<R: TableRecord>(&self, record: &R) -> Result<u64, DbError> {
        self.delete_all(std::slice::from_ref(record)).await
    }

    /// Delete every record's row in one statement; the WHERE clause is the
    /// OR over each record's primary-key conjunction. An empty slice
    /// returns 0.
    ///
    /// # Errors
    /// Driver errors, or an execution error for a keyless table.
    pub async fn delete_all<R: TableRecord>(&self, records: &[R]) -> Result<u64, DbError> {
        let Some(SqlPlan { sql, params }) = ops::delete_plan(records)? else {
            return Ok(0);
        };
        self.execute(sql, params).await
    }

    /// Grouped row count: `SELECT group_by, COUNT(*) FROM table [WHERE
    /// filter] GROUP BY group_by` as a map from group key to count.
    ///
    /// # Errors
    /// Driver errors, or `DbError::UnexpectedNullField` when a group key is
    /// NULL.
    pub async fn count(
        &self,
        table: &str,
        filter: Option<(&str, Vec<SqlValue>)>,
        group_by: &str,
    ) -> Result<HashMap<SqlValue, i64>, DbError> {
        let SqlPlan { sql, params } = ops::count_plan(table, filter, group_by);
        let result = self.query(sql, params).await?;
        let mut counts = HashMap::with_capacity(result.len());
        for row in &result.rows {
            let key = row.value_at(0).cloned().unwrap_or(SqlValue::Null);
            if key.is_null() {
                return Err(DbError::UnexpectedNullField(format!("{table}.{group_by}")));
            }
            let count = row
                .value_at(1)
                .and_then(SqlValue::read::<i64>)
                .ok_or_else(|| DbError::Execution("COUNT(*) did not return an integer".into()))?;
            counts.insert(key, count);
        }
        Ok(counts)
    }
}
