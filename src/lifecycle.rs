//! Host shutdown integration.
//!
//! Dispatchers are owned by whatever configuration object created them;
//! there is no global registry. The host wires each one to its shutdown
//! signal with [`close_on_shutdown`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;

/// Close `dispatcher` when `shutdown` fires.
///
/// Closing the dispatcher drains its worker pool: pending acquires resolve
/// promptly and idle workers shut down. Releases arriving afterwards are
/// no-ops.
pub fn close_on_shutdown(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown.cancelled().await;
        tracing::debug!("shutdown signal received; closing sql dispatcher");
        dispatcher.close();
    })
}
