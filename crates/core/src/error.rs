//! Error model.
//!
//! Registration, removal, trigger and `wait` never fail: they report through
//! `Option`/`bool`. Errors are reserved for thread spawning, one-shot value
//! retrieval and configuration loading.

use thiserror::Error;

/// Result type used across the emitter crates.
pub type EmitterResult<T> = Result<T, EmitterError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// The OS refused to start a helper thread.
    #[error("failed to spawn thread: {0}")]
    Spawn(String),

    /// A one-shot value was not delivered within the allotted time.
    #[error("timed out waiting for event")]
    Timeout,

    /// The one-shot registration was dropped before the event fired
    /// (removed, cleared, or its provider was dropped).
    #[error("event source dropped before the event fired")]
    Abandoned,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EmitterError {
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
