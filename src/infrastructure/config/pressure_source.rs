//! Pressure table sources backed by configuration.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, PressureAdjustments, PressureLevel};
use crate::domain::ports::PressureConfigSource;

/// Serves the `pressure` section of a loaded [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigPressureSource {
    table: BTreeMap<PressureLevel, PressureAdjustments>,
}

impl ConfigPressureSource {
    pub fn new(table: BTreeMap<PressureLevel, PressureAdjustments>) -> Self {
        Self { table }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pressure.clone())
    }

    /// Read a standalone pressure table (`high: {...}`, `medium: {...}`, ...).
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pressure table {}", path.display()))?;
        let table = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse pressure table {}", path.display()))?;
        Ok(Self::new(table))
    }
}

impl PressureConfigSource for ConfigPressureSource {
    fn load_pressure_config(&self) -> DomainResult<BTreeMap<PressureLevel, PressureAdjustments>> {
        Ok(self.table.clone())
    }
}
