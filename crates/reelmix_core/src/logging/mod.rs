//! Logging: a per-job file logger plus the global `tracing` subscriber.
//!
//! # Example
//!
//! ```no_run
//! use reelmix_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("job-1234", ".logs", LogConfig::default(), None).unwrap();
//! logger.stage("Normalize");
//! logger.command("ffmpeg -i voice.src ...");
//! logger.success("voice normalized");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Output goes
/// to stderr. Calling this twice is harmless.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .try_init();
}

/// Tracing for tests (warnings and above, captured per test).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init_test_tracing();
        init_test_tracing();
    }

    #[test]
    fn filter_strings() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
    }
}
