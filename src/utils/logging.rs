//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and one
//! formatting layer per enabled output. `RUST_LOG` overrides the configured
//! level when set.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Filter built from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let console = fmt::layer().with_target(true);
        layers.push(if config.json_format {
            console.json().boxed()
        } else {
            console.boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("log_file_path must be set when log_to_file is true".into())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file: {e}")))?;
        let writer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        layers.push(if config.json_format {
            writer.json().boxed()
        } else {
            writer.boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(config))
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "logging initialized");
    Ok(())
}
