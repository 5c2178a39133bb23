//! `herald-events`: typed, in-process publish/subscribe.
//!
//! - [`HandlerStore`]: ordered registry, synchronous trigger
//! - [`DeferredProvider`]: trigger enqueues, an explicit drain runs handlers
//! - [`ThreadedProvider`]: lock-serialized store with blocking wait and one-shot futures
//! - [`Dispatcher`]: demultiplexes one channel by key
//!
//! Disable the default `threaded` feature to build without the blocking/threaded surface.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod deferred;
pub mod dispatcher;
pub mod source;
pub mod store;

#[cfg(feature = "threaded")]
pub mod future;
#[cfg(feature = "threaded")]
pub mod threaded;

pub use deferred::{DeferredProvider, DeferredQueue, DeferredTask, Deferrer};
pub use dispatcher::Dispatcher;
pub use herald_core::{EmitterConfig, EmitterError, EmitterResult, Handle};
pub use source::EventSource;
pub use store::{Handler, HandlerStore};

#[cfg(feature = "threaded")]
pub use future::EventFuture;
#[cfg(feature = "threaded")]
pub use threaded::{ThreadedProvider, WAIT_FOREVER};

/// Lock a mutex, recovering the data if a handler panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
