//! Tracing/logging setup shared by binaries and tests.

/// Initialize process-wide tracing (JSON, `RUST_LOG`-filtered).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize compact, test-captured tracing output.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber construction (filters, layers).
pub mod tracing;
