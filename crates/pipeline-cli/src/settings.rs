//! Layered configuration
//!
//! Defaults, then `tire-pipeline.toml` (or the file named by
//! `TIRE_PIPELINE_CONFIG`), then `TIRE__SECTION__KEY` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use degradation_model::InferenceDefaults;
use preprocessing::PipelineSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use telemetry_store::StoreConfig;

pub const CONFIG_PATH_VAR: &str = "TIRE_PIPELINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tire-pipeline.toml";

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Random forest artifact (JSON)
    pub model_path: PathBuf,
    /// Training metadata (JSON)
    pub metadata_path: PathBuf,
    /// Scaler written by `prepare`; predictions use raw features when unset
    pub scaler_path: Option<PathBuf>,
    /// Fallbacks for features a lap lacks
    pub defaults: InferenceDefaults,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/tire_degradation_random_forest.json"),
            metadata_path: PathBuf::from("models/model_metadata.json"),
            scaler_path: None,
            defaults: InferenceDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection
    pub store: StoreConfig,
    /// Feature pipeline
    pub pipeline: PipelineSettings,
    /// Model artifacts
    pub model: ModelConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TIRE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pipeline.race_ids")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Invalid configuration (file: {})", path.display()))
    }

    /// Parse a TOML document on its own, without the environment
    pub fn from_toml(text: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Invalid configuration")
    }
}
