//! Process-wide tracing/logging setup shared by Depot binaries and tests.

pub mod tracing;

pub use tracing::{CapturedLogs, capture};

/// Initialize JSON logging filtered by `RUST_LOG` (default [`tracing::DEFAULT_DIRECTIVES`]).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_DIRECTIVES);
}
