use tracing_subscriber::EnvFilter;

use crate::loader::LoggingConfig;

/// Thin wrapper around `tracing_subscriber::fmt()` honoring the configured
/// level/json switches, falling back to `RUST_LOG` when set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}
