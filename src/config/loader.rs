//! Configuration Loader
//!
//! Environment-aware configuration loading: compiled-in defaults, overlaid by
//! `config/deskhive.toml`, an environment-specific
//! `config/deskhive.{env}.toml`, and finally `DESKHIVE__`-prefixed
//! environment variables (e.g. `DESKHIVE__SYNC__INTERVAL_SECONDS=300`).

use config::{Config, Environment, File};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::DeskhiveConfig;
use crate::error::{BookingError, Result};

/// Loaded, validated configuration handle shared across components.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<DeskhiveConfig>,
    environment: String,
}

impl ConfigManager {
    /// Load configuration for the auto-detected environment.
    pub fn load() -> Result<Arc<Self>> {
        Self::load_from_dir("config")
    }

    /// Load configuration rooted at the given directory.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Arc<Self>> {
        let environment = detect_environment();
        let dir = dir.as_ref();

        let base = dir.join("deskhive");
        let env_specific = dir.join(format!("deskhive.{environment}"));

        let defaults = Config::try_from(&DeskhiveConfig::default())
            .map_err(|e| BookingError::Configuration(format!("invalid defaults: {e}")))?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_specific.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("DESKHIVE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| BookingError::Configuration(format!("failed to build config: {e}")))?;

        let config: DeskhiveConfig = merged
            .try_deserialize()
            .map_err(|e| BookingError::Configuration(format!("failed to deserialize config: {e}")))?;

        config.validate()?;

        info!(
            environment = %environment,
            sync_interval_seconds = config.sync.interval_seconds,
            worker_concurrency = config.sync.worker_concurrency,
            "Configuration loaded"
        );
        debug!(?config, "Effective configuration");

        Ok(Arc::new(Self {
            config: Arc::new(config),
            environment,
        }))
    }

    /// Build a manager from an in-memory configuration, bypassing files.
    ///
    /// Intended for tests and embedding hosts that assemble configuration
    /// themselves.
    pub fn from_config(config: DeskhiveConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config: Arc::new(config),
            environment: detect_environment(),
        }))
    }

    pub fn config(&self) -> &DeskhiveConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Current environment from `DESKHIVE_ENV`/`APP_ENV`, defaulting to development.
fn detect_environment() -> String {
    std::env::var("DESKHIVE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
