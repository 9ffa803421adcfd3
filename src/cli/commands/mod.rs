//! CLI command implementations.

pub mod config;
pub mod pressure;
pub mod simulate;
