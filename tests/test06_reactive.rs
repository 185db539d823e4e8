use std::future::Future;
use std::sync::Arc;

use sql_affinity::sqlite::SqliteSource;
use sql_affinity::{
    DbError, DispatcherSettings, ReactiveQuerySource, ReactiveTransactionManager, SourceMode,
    TransactionManager, TransactionOptions, TransactionRouter,
};

/// Async-native source that runs bodies directly.
struct DirectSource;

impl ReactiveQuerySource for DirectSource {
    type Session = TransactionOptions;

    fn in_transaction<T, F, Fut>(
        &self,
        options: TransactionOptions,
        body: F,
    ) -> impl Future<Output = Result<T, DbError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(Self::Session) -> Fut + Send,
        Fut: Future<Output = Result<T, DbError>> + Send,
    {
        async move { body(options).await }
    }
}

/// Async-native source whose transaction primitive fails with the wrapped
/// chain a blocking bridge would produce.
struct FailingSource;

#[derive(Debug, thiserror::Error)]
#[error("connection reset by peer")]
struct WireError;

impl ReactiveQuerySource for FailingSource {
    type Session = ();

    fn in_transaction<T, F, Fut>(
        &self,
        _options: TransactionOptions,
        body: F,
    ) -> impl Future<Output = Result<T, DbError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(Self::Session) -> Fut + Send,
        Fut: Future<Output = Result<T, DbError>> + Send,
    {
        async move {
            drop(body);
            Err(DbError::data_access(
                "Rollback caused",
                Some(DbError::data_access(
                    "Exception when blocking on publisher",
                    Some(DbError::driver(WireError)),
                )),
            ))
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn reactive_transactions_delegate_to_the_source() {
    let manager = ReactiveTransactionManager::new(Arc::new(DirectSource));
    let value = manager
        .transaction(TransactionOptions::default(), |_session| async move {
            Ok(21 * 2)
        })
        .await
        .expect("transaction");
    assert_eq!(value, 42);
}

#[tokio::test(flavor = "current_thread")]
async fn read_only_is_dropped_with_a_diagnostic_on_the_reactive_path() {
    let manager = ReactiveTransactionManager::new(Arc::new(DirectSource));
    let seen = manager
        .transaction(
            TransactionOptions::default().read_only(true),
            |session| async move { Ok(session.read_only) },
        )
        .await
        .expect("transaction");
    assert!(!seen, "the source must not observe the unsupported flag");
}

#[tokio::test(flavor = "current_thread")]
async fn wrapped_bridge_errors_surface_the_driver_cause() {
    let manager = ReactiveTransactionManager::new(Arc::new(FailingSource));
    let err = manager
        .transaction(TransactionOptions::default(), |_session: ()| async move {
            Ok(())
        })
        .await
        .unwrap_err();
    match err {
        DbError::Driver(inner) => {
            assert_eq!(inner.to_string(), "connection reset by peer");
        }
        other => panic!("expected the driver cause, got {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn router_reports_its_mode_and_closes_the_blocking_side() {
    let source = Arc::new(SqliteSource::builder(":memory:".into()).build());
    let dispatcher = Arc::new(
        DispatcherSettings::builder()
            .pool_size(1)
            .finish()
            .build_dispatcher("t06"),
    );
    let blocking: TransactionRouter<SqliteSource, DirectSource> =
        TransactionManager::new(source, Arc::clone(&dispatcher)).into();
    assert_eq!(blocking.mode(), SourceMode::Blocking);
    blocking.close();
    let after = dispatcher
        .run(|handle| async move { handle.execute(|| Ok(())).await })
        .await;
    assert!(after.is_err(), "router close must close the dispatcher");

    let reactive: TransactionRouter<SqliteSource, DirectSource> =
        ReactiveTransactionManager::new(Arc::new(DirectSource)).into();
    assert_eq!(reactive.mode(), SourceMode::Reactive);
    reactive.close();
}
