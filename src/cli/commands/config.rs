//! Configuration commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Validate a configuration file, or the effective configuration
    Validate {
        /// File to validate
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidationOutput {
    pub source: String,
    pub valid: bool,
    pub pressure_levels: usize,
    pub default_strategy: String,
    pub plateau_window: usize,
}

impl CommandOutput for ConfigValidationOutput {
    fn to_human(&self) -> String {
        format!(
            "Configuration from {} is valid ({} pressure levels, default strategy {}, plateau window {})",
            self.source, self.pressure_levels, self.default_strategy, self.plateau_window
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn validate(path: Option<&PathBuf>, effective: &Config) -> Result<ConfigValidationOutput> {
    let (source, config) = match path {
        Some(path) => (
            path.display().to_string(),
            ConfigLoader::load_from_file(path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?,
        ),
        None => ("effective settings".to_string(), effective.clone()),
    };
    Ok(ConfigValidationOutput {
        source,
        valid: true,
        pressure_levels: config.pressure.len(),
        default_strategy: config.optimizer.default_strategy.to_string(),
        plateau_window: config.optimizer.plateau_window,
    })
}

pub async fn execute(args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => output(
            &ConfigShowOutput {
                config: config.clone(),
            },
            json_mode,
        ),
        ConfigCommands::Validate { path } => output(&validate(path.as_ref(), config)?, json_mode),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_effective() {
        let out = validate(None, &Config::default()).unwrap();
        assert!(out.valid);
        assert_eq!(out.pressure_levels, 4);
        assert_eq!(out.default_strategy, "hybrid");
    }

    #[test]
    fn test_validate_rejects_bad_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "fitness:\n  reference_latency_ms: 0").unwrap();
        let err = validate(Some(&file.path().to_path_buf()), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("not a valid configuration"));
    }

    #[test]
    fn test_show_renders_yaml() {
        let out = ConfigShowOutput {
            config: Config::default(),
        };
        assert!(out.to_human().contains("plateau_window"));
    }
}
