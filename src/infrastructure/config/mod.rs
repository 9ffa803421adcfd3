//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Pressure table sources for the optimizer

pub mod loader;
pub mod pressure_source;

pub use loader::{ConfigError, ConfigLoader};
pub use pressure_source::ConfigPressureSource;
