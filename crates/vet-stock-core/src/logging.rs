//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if config.log_json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
