use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::optimization::OptimizationStrategy;
use super::pressure::{PressureAdjustments, PressureLevel};

/// Main configuration structure for Variant Forge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pressure table keyed by level (high/medium/low/training)
    #[serde(default = "default_pressure_table")]
    pub pressure: BTreeMap<PressureLevel, PressureAdjustments>,

    /// Fitness scoring configuration
    #[serde(default)]
    pub fitness: FitnessConfig,

    /// Optimization loop configuration
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Retry policy for external service calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Hierarchical learning configuration
    #[serde(default)]
    pub learning: LearningConfig,
}

fn default_pressure_table() -> BTreeMap<PressureLevel, PressureAdjustments> {
    [
        PressureLevel::High,
        PressureLevel::Medium,
        PressureLevel::Low,
        PressureLevel::Training,
    ]
    .into_iter()
    .map(|level| (level, PressureAdjustments::default_for(level)))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            pressure: default_pressure_table(),
            fitness: FitnessConfig::default(),
            optimizer: OptimizerConfig::default(),
            retry: RetryConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Weights and boundaries used to turn raw metrics into fitness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FitnessConfig {
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,

    #[serde(default = "default_speed_weight")]
    pub speed_weight: f64,

    #[serde(default = "default_correctness_weight")]
    pub correctness_weight: f64,

    /// Latency (ms) that maps to a speed score of 0.5
    #[serde(default = "default_reference_latency_ms")]
    pub reference_latency_ms: f64,

    /// Lower bound of the "excellent" verdict
    #[serde(default = "default_excellent_threshold")]
    pub excellent_threshold: f64,

    /// Lower bound of the "good" verdict
    #[serde(default = "default_good_threshold")]
    pub good_threshold: f64,

    /// Lower bound of the "acceptable" verdict; failures always score below it
    #[serde(default = "default_acceptable_threshold")]
    pub acceptable_threshold: f64,

    /// Quality assumed when no external quality proxy was supplied
    #[serde(default = "default_neutral_quality")]
    pub neutral_quality: f64,
}

const fn default_quality_weight() -> f64 {
    0.5
}

const fn default_speed_weight() -> f64 {
    0.2
}

const fn default_correctness_weight() -> f64 {
    0.3
}

const fn default_reference_latency_ms() -> f64 {
    100.0
}

const fn default_excellent_threshold() -> f64 {
    0.85
}

const fn default_good_threshold() -> f64 {
    0.7
}

const fn default_acceptable_threshold() -> f64 {
    0.5
}

const fn default_neutral_quality() -> f64 {
    0.5
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            quality_weight: default_quality_weight(),
            speed_weight: default_speed_weight(),
            correctness_weight: default_correctness_weight(),
            reference_latency_ms: default_reference_latency_ms(),
            excellent_threshold: default_excellent_threshold(),
            good_threshold: default_good_threshold(),
            acceptable_threshold: default_acceptable_threshold(),
            neutral_quality: default_neutral_quality(),
        }
    }
}

/// Optimization loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizerConfig {
    /// Consecutive non-promoting iterations before the loop stops
    #[serde(default = "default_plateau_window")]
    pub plateau_window: usize,

    /// Iterations used when the caller does not specify any
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: usize,

    /// Timeout applied to every external service call
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,

    /// Strategy used by `simulate` and when "auto" finds nothing better
    #[serde(default = "default_strategy")]
    pub default_strategy: OptimizationStrategy,
}

const fn default_plateau_window() -> usize {
    3
}

const fn default_max_iterations() -> usize {
    10
}

const fn default_service_timeout_ms() -> u64 {
    30_000
}

const fn default_strategy() -> OptimizationStrategy {
    OptimizationStrategy::Hybrid
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            plateau_window: default_plateau_window(),
            default_max_iterations: default_max_iterations(),
            service_timeout_ms: default_service_timeout_ms(),
            default_strategy: default_strategy(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Hierarchical learning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearningConfig {
    /// Minimum number of child nodes with recorded executions
    #[serde(default = "default_min_children")]
    pub min_children: usize,

    /// Quality spread below which children count as tied
    #[serde(default = "default_quality_epsilon")]
    pub quality_epsilon: f64,

    /// Relative latency spread below which children count as tied
    #[serde(default = "default_speed_epsilon")]
    pub speed_epsilon: f64,

    /// Strategy returned when no recorded preference matches a pattern
    #[serde(default = "default_strategy")]
    pub fallback_strategy: OptimizationStrategy,

    /// Most recent child executions kept per parent node
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

const fn default_min_children() -> usize {
    2
}

const fn default_quality_epsilon() -> f64 {
    0.02
}

const fn default_speed_epsilon() -> f64 {
    0.05
}

const fn default_history_window() -> usize {
    256
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_children: default_min_children(),
            quality_epsilon: default_quality_epsilon(),
            speed_epsilon: default_speed_epsilon(),
            fallback_strategy: default_strategy(),
            history_window: default_history_window(),
        }
    }
}
