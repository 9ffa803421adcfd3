use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::pressure_manager::validate_table;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid fitness weights: {0}")]
    InvalidWeights(String),

    #[error(
        "Invalid verdict thresholds: expected 0 < acceptable ({acceptable}) <= good ({good}) <= excellent ({excellent}) <= 1"
    )]
    InvalidThresholds {
        acceptable: f64,
        good: f64,
        excellent: f64,
    },

    #[error("Invalid reference_latency_ms: {0}. Must be positive")]
    InvalidReferenceLatency(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid service_timeout_ms: {0}. Must be at least 1")]
    InvalidServiceTimeout(u64),

    #[error("Invalid learning configuration: {0}")]
    InvalidLearning(String),

    #[error("Invalid pressure table: {0}")]
    InvalidPressure(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .variant-forge/config.yaml (project config)
    /// 3. .variant-forge/local.yaml (project local overrides, optional)
    /// 4. Environment variables (VARIANT_FORGE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".variant-forge/config.yaml"))
            .merge(Yaml::file(".variant-forge/local.yaml"))
            .merge(Env::prefixed("VARIANT_FORGE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("VARIANT_FORGE_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let fitness = &config.fitness;
        let weights = [
            ("quality_weight", fitness.quality_weight),
            ("speed_weight", fitness.speed_weight),
            ("correctness_weight", fitness.correctness_weight),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidWeights(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }

        let ordered = 0.0 < fitness.acceptable_threshold
            && fitness.acceptable_threshold <= fitness.good_threshold
            && fitness.good_threshold <= fitness.excellent_threshold
            && fitness.excellent_threshold <= 1.0;
        if !ordered {
            return Err(ConfigError::InvalidThresholds {
                acceptable: fitness.acceptable_threshold,
                good: fitness.good_threshold,
                excellent: fitness.excellent_threshold,
            });
        }

        if !(fitness.reference_latency_ms.is_finite() && fitness.reference_latency_ms > 0.0) {
            return Err(ConfigError::InvalidReferenceLatency(
                fitness.reference_latency_ms,
            ));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.optimizer.service_timeout_ms == 0 {
            return Err(ConfigError::InvalidServiceTimeout(
                config.optimizer.service_timeout_ms,
            ));
        }

        let learning = &config.learning;
        if learning.min_children < 2 {
            return Err(ConfigError::InvalidLearning(format!(
                "min_children must be at least 2, got {}",
                learning.min_children
            )));
        }
        if learning.history_window < learning.min_children {
            return Err(ConfigError::InvalidLearning(format!(
                "history_window ({}) must be at least min_children ({})",
                learning.history_window, learning.min_children
            )));
        }
        if learning.quality_epsilon < 0.0 || learning.speed_epsilon < 0.0 {
            return Err(ConfigError::InvalidLearning(
                "epsilons must not be negative".to_string(),
            ));
        }

        validate_table(&config.pressure)
            .map_err(|err| ConfigError::InvalidPressure(err.to_string()))?;

        Ok(())
    }
}
