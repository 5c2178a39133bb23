//! `herald-core`: identity, error and configuration primitives shared by
//! the event providers.
//!
//! This crate contains no dispatch logic.

pub mod config;
pub mod error;
pub mod id;

pub use config::EmitterConfig;
pub use error::{EmitterError, EmitterResult};
pub use id::Handle;
