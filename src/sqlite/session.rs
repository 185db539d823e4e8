use rusqlite::Statement;

use crate::error::DbError;
use crate::results::{ResultSet, SqlValue};
use crate::session::{BlockingQuerySource, BlockingSession, IsolationLevel};

use super::convert::bind_values;
use super::SqliteOptions;

/// Reference blocking source backed by rusqlite.
///
/// Sessions are connection-per-session: each transaction opens its own
/// `SQLite` connection, which keeps the blocking contract honest (the
/// connection lives and dies on the worker thread the transaction is pinned
/// to).
pub struct SqliteSource {
    options: SqliteOptions,
}

impl SqliteSource {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }
}

impl BlockingQuerySource for SqliteSource {
    type Session = SqliteSession;

    fn open_session(&self) -> Result<SqliteSession, DbError> {
        let conn = rusqlite::Connection::open(&self.options.db_path).map_err(DbError::driver)?;
        conn.busy_timeout(self.options.busy_timeout)
            .map_err(DbError::driver)?;
        Ok(SqliteSession {
            conn,
            immediate: self.options.immediate_transactions,
            in_transaction: false,
        })
    }
}

/// One rusqlite connection, driven synchronously from a worker thread.
pub struct SqliteSession {
    conn: rusqlite::Connection,
    immediate: bool,
    in_transaction: bool,
}

impl BlockingSession for SqliteSession {
    fn begin(&mut self) -> Result<(), DbError> {
        // BEGIN IMMEDIATE takes the write lock up front so concurrent write
        // transactions queue on busy_timeout instead of failing mid-flight.
        let begin = if self.immediate {
            "BEGIN IMMEDIATE"
        } else {
            "BEGIN"
        };
        self.conn.execute_batch(begin).map_err(DbError::driver)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT").map_err(DbError::driver)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(DbError::driver)?;
        self.in_transaction = false;
        Ok(())
    }

    fn set_isolation(&mut self, isolation: IsolationLevel) -> Result<(), DbError> {
        // SQLite transactions are serializable; shared-cache readers may opt
        // into dirty reads, which is the one level with a native switch.
        let read_uncommitted = matches!(isolation, IsolationLevel::ReadUncommitted);
        self.conn
            .pragma_update(None, "read_uncommitted", read_uncommitted)
            .map_err(DbError::driver)
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), DbError> {
        self.conn
            .pragma_update(None, "query_only", read_only)
            .map_err(DbError::driver)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(DbError::driver)?;
        let affected = stmt
            .execute(rusqlite::params_from_iter(bind_values(params)))
            .map_err(DbError::driver)?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(DbError::driver)?;
        read_rows(&mut stmt, bind_values(params))
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        // Keep the file consistent if a session is dropped mid-transaction.
        if self.in_transaction {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn read_rows(
    stmt: &mut Statement<'_>,
    values: Vec<rusqlite::types::Value>,
) -> Result<ResultSet, DbError> {
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(ToOwned::to_owned)
        .collect();
    let width = names.len();
    let mut result = ResultSet::for_columns(names);

    let mut rows = stmt
        .query(rusqlite::params_from_iter(values))
        .map_err(DbError::driver)?;
    while let Some(row) = rows.next().map_err(DbError::driver)? {
        let mut decoded = Vec::with_capacity(width);
        for index in 0..width {
            let cell = row.get_ref(index).map_err(DbError::driver)?;
            decoded.push(SqlValue::from(cell));
        }
        result.push_values(decoded);
    }
    Ok(result)
}
