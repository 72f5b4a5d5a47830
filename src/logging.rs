//! Logging configuration
//!
//! Structured logging with tracing.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize logging with environment-based filtering
///
/// `RUST_LOG` wins when set; otherwise `oniondrop` logs at INFO, or DEBUG
/// when `verbose` is set.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("oniondrop={}", level)));

    // Ignore a second init (tests, embedding)
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
