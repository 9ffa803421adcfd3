//! Infrastructure layer module
//!
//! This module contains the ambient plumbing around the optimizer:
//! - Configuration management (figment, layered YAML + environment)
//! - Logging infrastructure (tracing, rolling files)
//! - File-backed pressure table source

pub mod config;
pub mod logging;
