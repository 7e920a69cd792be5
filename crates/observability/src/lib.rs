//! Process-wide logging setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Install the global subscriber with JSON output.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}
