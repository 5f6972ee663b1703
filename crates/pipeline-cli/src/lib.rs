//! Tire degradation pipeline CLI
//!
//! Builds training data from the telemetry store and serves degradation
//! predictions and what-if comparisons from a trained model.

pub mod app;
pub mod command;
pub mod export;
pub mod settings;

pub use app::AppContext;
pub use command::{Command, USAGE};
pub use settings::{AppConfig, LoggingConfig, ModelConfig};

use anyhow::{anyhow, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so
/// reports on stdout stay machine-readable.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("Invalid log level {:?}: {}", config.level, e))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}
