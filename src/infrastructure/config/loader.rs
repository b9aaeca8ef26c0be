//! figment-based config loader.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Endpoint fields must not be blank
    #[error("Empty endpoint for {0}")]
    EmptyEndpoint(&'static str),

    /// think_interval_ms must be positive
    #[error("Invalid think_interval_ms: {0}. Must be positive")]
    InvalidThinkInterval(u64),

    /// cache_refresh_ms must be positive
    #[error("Invalid cache_refresh_ms: {0}. Must be positive")]
    InvalidCacheRefresh(u64),

    /// Thresholds must be positive
    #[error("Invalid {field}: {value}. Must be at least 1")]
    InvalidThreshold {
        /// Field name
        field: &'static str,
        /// Offending value
        value: u32,
    },

    /// Log level outside the known set
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Log format outside the known set
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Energy floors must be ordered
    #[error("critical_energy ({0}) must be below low_energy ({1})")]
    InvertedEnergyFloors(f32, f32),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .harrow/config.yaml (project config)
    /// 3. .harrow/local.yaml (local overrides, optional)
    /// 4. Environment variables (HARROW_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".harrow/config.yaml"))
            .merge(Yaml::file(".harrow/local.yaml"))
            .merge(Env::prefixed("HARROW_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("HARROW_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.bridge.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint("bridge.base_url"));
        }
        if config.vlm.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint("vlm.endpoint"));
        }

        if config.agent.think_interval_ms == 0 {
            return Err(ConfigError::InvalidThinkInterval(
                config.agent.think_interval_ms,
            ));
        }
        if config.bridge.cache_refresh_ms == 0 {
            return Err(ConfigError::InvalidCacheRefresh(
                config.bridge.cache_refresh_ms,
            ));
        }

        for (field, value) in [
            ("stuck_threshold", config.agent.stuck_threshold),
            (
                "target_failure_threshold",
                config.agent.target_failure_threshold,
            ),
            ("phantom_threshold", config.agent.phantom_threshold),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidThreshold { field, value });
            }
        }

        if config.agent.critical_energy >= config.agent.low_energy {
            return Err(ConfigError::InvertedEnergyFloors(
                config.agent.critical_energy,
                config.agent.low_energy,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
