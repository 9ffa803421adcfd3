//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - pretty or JSON output on stderr
//! - optional rolling JSON log files via tracing-appender
//! - `RUST_LOG` style filtering on top of the configured level

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
