//! Structured logging bootstrap for the keychain workspace.
//!
//! Centralized `tracing` initialization with plain and JSON output,
//! configured through the environment.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with human-readable output.
///
/// The log level is taken from the `RUST_LOG` environment variable and
/// defaults to `info`.
///
/// # Example
/// ```no_run
/// use keychain_core::logging;
///
/// logging::init();
/// tracing::info!("engine starting");
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// Initialize logging with JSON output for log-aggregation pipelines.
///
/// The log level is taken from the `RUST_LOG` environment variable and
/// defaults to `info`.
pub fn init_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_construction_doesnt_panic() {
        // A subscriber can only be installed once per process, so only
        // the filter setup is exercised here.
        let _ = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    }
}
