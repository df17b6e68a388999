use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, StoreBackend};

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".durable-tasks";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "DURABLE_TASKS_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Store base_dir cannot be empty for the file backend")]
    EmptyBaseDir,

    #[error("Invalid retry multiplier: {0}. Must be at least 1.0")]
    InvalidMultiplier(f64),

    #[error(
        "Invalid backoff configuration: initial_delay_ms ({0}) must not exceed max_delay_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid task timeout: timeout_secs cannot be 0")]
    ZeroTimeout,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .durable-tasks/config.yaml (project config)
    /// 3. .durable-tasks/local.yaml (local overrides, optional)
    /// 4. Environment variables (DURABLE_TASKS_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with an explicit project root
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Write the default configuration as YAML, creating parent directories
    pub fn write_default(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(&Config::default())
            .context("Failed to serialize default configuration")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.store.backend == StoreBackend::File && config.store.base_dir.trim().is_empty() {
            return Err(ConfigError::EmptyBaseDir);
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        // Validate retry config
        if !(config.retry.multiplier >= 1.0) {
            return Err(ConfigError::InvalidMultiplier(config.retry.multiplier));
        }

        if config.retry.initial_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_delay_ms,
                config.retry.max_delay_ms,
            ));
        }

        if config.task.timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}
