use std::time::Duration;

use thiserror::Error;

/// Driver errors are carried opaquely so the crate stays agnostic of the
/// underlying SQL library.
pub type BoxedDriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Message used when a failed transaction body is wrapped on the way out.
pub(crate) const ROLLBACK_SENTINEL: &str = "Rollback caused";

/// Message used when the async bridge wraps an error from the source's own
/// transaction primitive.
pub(crate) const PUBLISHER_SENTINEL: &str = "Exception when blocking on publisher";

#[derive(Debug, Error)]
pub enum DbError {
    /// No worker became available within the configured acquire timeout.
    #[error("timed out acquiring a database worker after {timeout:?}")]
    AcquireTimeout { timeout: Duration },

    /// The worker pool was closed while (or before) waiting for a worker.
    #[error("worker pool closed")]
    PoolClosed,

    /// The pool-metadata registry did not recognize the supplied pool object.
    #[error("unrecognized connection pool type: {0}")]
    UnknownPoolType(String),

    /// Generic data-access failure. The bridge layers use this with sentinel
    /// messages; [`DbError::normalize`] strips those before errors surface.
    #[error("{message}")]
    DataAccess {
        message: String,
        #[source]
        source: Option<Box<DbError>>,
    },

    /// An error raised by the underlying driver, forwarded verbatim.
    #[error("{0}")]
    Driver(BoxedDriverError),

    /// The surrounding task was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal sentinel raised from within a transaction body to request a
    /// rollback. The facade rolls back and propagates it.
    #[error("transaction rollback requested")]
    RollbackRequested,

    #[error("More than one record match the condition")]
    MoreThanOneRecord,

    #[error("No records match the condition")]
    NoRecordsMatch,

    /// A field that must not be NULL was NULL; carries the qualified name.
    #[error("unexpected null field: {0}")]
    UnexpectedNullField(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SQL execution error: {0}")]
    Execution(String),
}

impl DbError {
    /// Build a data-access error, optionally chaining a cause.
    #[must_use]
    pub fn data_access(message: impl Into<String>, source: Option<DbError>) -> Self {
        DbError::DataAccess {
            message: message.into(),
            source: source.map(Box::new),
        }
    }

    /// Wrap a driver error.
    #[must_use]
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DbError::Driver(Box::new(err))
    }

    fn sentinel_cause(&self) -> Option<Option<&DbError>> {
        match self {
            DbError::DataAccess { message, source }
                if message == ROLLBACK_SENTINEL || message == PUBLISHER_SENTINEL =>
            {
                Some(source.as_deref())
            }
            _ => None,
        }
    }

    /// Strip the sentinel wrappers inserted by the transaction and bridge
    /// layers so callers see the original cause.
    ///
    /// Unwrapping walks one level at a time while the error is a bare
    /// data-access wrapper carrying one of the sentinel messages. It stops at
    /// the first real error (driver or any non-sentinel kind). A sentinel with
    /// no cause cannot be unwrapped; the whole chain is re-wrapped instead.
    #[must_use]
    pub fn normalize(self) -> DbError {
        let mut depth = 0usize;
        let mut current: &DbError = &self;
        loop {
            match current.sentinel_cause() {
                Some(Some(inner)) => {
                    depth += 1;
                    current = inner;
                }
                Some(None) => {
                    return DbError::data_access(ROLLBACK_SENTINEL, Some(self));
                }
                None => break,
            }
        }
        let mut unwrapped = self;
        for _ in 0..depth {
            unwrapped = match unwrapped {
                DbError::DataAccess {
                    source: Some(inner),
                    ..
                } => *inner,
                other => return other,
            };
        }
        unwrapped
    }
}
