//! Tracing setup shared by binaries and tests.

pub mod tracing;

/// Initialize process-wide logging. Safe to call multiple times; subsequent
/// calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Human-readable output for tests, `RUST_LOG`-driven like [`init`].
pub fn init_for_tests() {
    tracing::init_compact();
}
