//! Logging initialisation
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` wins over the configured
//! level when it is set.

use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Build the env filter used by [`init_logging`]
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber
///
/// Returns `false` when a subscriber was already installed (e.g. by a test harness).
pub fn init_logging(default_level: &str, format: LogFormat) -> bool {
    let filter = build_filter(default_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
