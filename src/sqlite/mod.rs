//! Reference blocking source backed by rusqlite.

mod convert;
mod session;

pub use session::{SqliteSession, SqliteSource};

use std::time::Duration;

/// Options for the `SQLite` source.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// How long a session waits on `SQLITE_BUSY` before giving up.
    pub busy_timeout: Duration,
    /// Begin transactions with `BEGIN IMMEDIATE` so writers queue instead of
    /// failing on lock upgrade.
    pub immediate_transactions: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: Duration::from_secs(30),
            immediate_transactions: true,
        }
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn immediate_transactions(mut self, immediate: bool) -> Self {
        self.opts.immediate_transactions = immediate;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build the source.
    #[must_use]
    pub fn build(self) -> SqliteSource {
        SqliteSource::new(self.finish())
    }
}

impl SqliteSource {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
