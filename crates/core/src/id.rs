//! Registration identity.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one handler registration.
///
/// Returned by every `on`/`once`/`register` call and accepted by `remove`.
/// Equality compares registrations, never the callables themselves: two
/// registrations of the same closure get distinct handles.
///
/// Handles come from a process-wide counter and are never reissued, so a
/// handle whose entry was removed cannot match anything registered later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Mint a fresh handle.
    pub fn new() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
