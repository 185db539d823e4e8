//! Task-to-worker affinity dispatching.

pub mod handle;
pub mod passthrough;
pub mod sticky;

pub use handle::DispatchHandle;
pub use passthrough::{Dispatcher, PassthroughDispatcher};
pub use sticky::StickyDispatcher;
