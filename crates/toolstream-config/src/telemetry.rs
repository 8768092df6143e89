//! Logging initialization from configuration.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::settings::LoggerConfig;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` still wins when set, so operators can raise verbosity for a
/// single run without touching the config file.
pub fn init_logging(config: &LoggerConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let json = config.format == "json";

    if config.output_path == "stdout" || config.output_path.is_empty() {
        if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.output_path)?;
        let writer = Arc::new(file);
        if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
        }
    }

    Ok(())
}
