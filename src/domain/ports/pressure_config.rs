//! Pressure configuration source port.

use std::collections::BTreeMap;

use crate::domain::errors::DomainResult;
use crate::domain::models::{PressureAdjustments, PressureLevel};

/// Source of the per-level pressure table.
pub trait PressureConfigSource: Send + Sync {
    fn load_pressure_config(&self) -> DomainResult<BTreeMap<PressureLevel, PressureAdjustments>>;
}
