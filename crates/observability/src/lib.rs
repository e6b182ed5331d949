//! Tracing and logging setup shared by the batchrun binaries.

/// Subscriber configuration (format, filters).
pub mod subscriber;

pub use subscriber::{LOG_FORMAT_ENV, LogFormat, ParseLogFormatError};

/// Initialize process-wide tracing.
///
/// The output format comes from `BATCHRUN_LOG_FORMAT` (`json` by default),
/// the filter from `RUST_LOG` (`info` by default). Safe to call multiple
/// times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init_with(LogFormat::from_env());
}

pub use subscriber::init_with;
