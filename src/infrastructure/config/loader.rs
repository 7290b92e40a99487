use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::assessment::MAX_STEPS_LIMIT;
use crate::domain::models::config::Config;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".assessor";

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "ASSESSOR_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_steps: {0}. Must be between 1 and 1000")]
    InvalidMaxSteps(u32),

    #[error("Invalid fan_in_timeout_secs: {0}. Must be at least 1")]
    InvalidFanInTimeout(u64),

    #[error("Invalid neutral_accuracy: {0}. Must be between 0 and 1")]
    InvalidNeutralAccuracy(f64),

    #[error("Default subject and course cannot be empty")]
    EmptyDefaultTarget,

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid deny pattern '{0}': {1}")]
    InvalidDenyPattern(String, String),

    #[error("Invalid path builder url: {0}. Must start with http:// or https://")]
    InvalidPathBuilderUrl(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .assessor/config.yaml
    /// 3. .assessor/local.yaml (optional overrides)
    /// 4. Environment variables (ASSESSOR_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same as [`ConfigLoader::load`] with the YAML layers read from `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let assessment = &config.assessment;
        if assessment.max_steps == 0 || assessment.max_steps > MAX_STEPS_LIMIT {
            return Err(ConfigError::InvalidMaxSteps(assessment.max_steps));
        }
        if assessment.fan_in_timeout_secs == 0 {
            return Err(ConfigError::InvalidFanInTimeout(assessment.fan_in_timeout_secs));
        }
        if !(0.0..=1.0).contains(&assessment.neutral_accuracy) {
            return Err(ConfigError::InvalidNeutralAccuracy(assessment.neutral_accuracy));
        }
        if assessment.default_subject.trim().is_empty() || assessment.default_course.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultTarget);
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.rate_limit.requests_per_second.is_nan() || config.rate_limit.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_second));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        for pattern in &config.generator.deny_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidDenyPattern(pattern.clone(), e.to_string()))?;
        }

        if let Some(url) = &config.path_builder.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidPathBuilderUrl(url.clone()));
            }
        }

        Ok(())
    }
}
