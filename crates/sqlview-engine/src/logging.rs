//! Tracing subscriber setup for binaries and tests embedding the facade

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "sqlview_engine=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_filter`
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// `verbose` switches the crate to debug level
pub fn filter_for(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("sqlview_engine={}", level)
}
