//! Pressure manager: maps a coarse selection pressure level to the numeric
//! thresholds every other component consumes.
//!
//! The table is loaded once from a [`PressureConfigSource`] and validated:
//! - every present entry is internally valid
//! - across HIGH → MEDIUM → LOW, `similarity_threshold` never increases and
//!   `max_distance_from_fittest` never decreases
//!
//! TRAINING is exempt from the ordering. A level missing from the table is a
//! configuration error on lookup; there is no fallback.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PressureAdjustments, PressureLevel};
use crate::domain::ports::PressureConfigSource;

/// Validated, immutable pressure table.
#[derive(Debug, Clone)]
pub struct PressureManager {
    table: BTreeMap<PressureLevel, PressureAdjustments>,
}

impl PressureManager {
    /// Build from an explicit table.
    pub fn new(table: BTreeMap<PressureLevel, PressureAdjustments>) -> DomainResult<Self> {
        validate_table(&table)?;
        debug!(levels = table.len(), "pressure table loaded");
        Ok(Self { table })
    }

    /// Build from a configuration source.
    pub fn from_source(source: &dyn PressureConfigSource) -> DomainResult<Self> {
        Self::new(source.load_pressure_config()?)
    }

    /// Thresholds for `level`.
    pub fn get_adjustments(&self, level: PressureLevel) -> DomainResult<PressureAdjustments> {
        self.table.get(&level).cloned().ok_or_else(|| {
            DomainError::Configuration(format!(
                "pressure level '{level}' is not configured"
            ))
        })
    }

    /// Configured levels in table order.
    pub fn levels(&self) -> impl Iterator<Item = (&PressureLevel, &PressureAdjustments)> {
        self.table.iter()
    }
}

/// Check entry validity and the monotonicity contract.
pub fn validate_table(table: &BTreeMap<PressureLevel, PressureAdjustments>) -> DomainResult<()> {
    for (level, adjustments) in table {
        adjustments.validate().map_err(|reason| {
            DomainError::Configuration(format!("pressure level '{level}': {reason}"))
        })?;
    }

    let ordered: Vec<(PressureLevel, &PressureAdjustments)> = PressureLevel::ORDERED
        .iter()
        .filter_map(|level| table.get(level).map(|adj| (*level, adj)))
        .collect();

    for pair in ordered.windows(2) {
        let (stricter, looser) = (&pair[0], &pair[1]);
        if looser.1.similarity_threshold > stricter.1.similarity_threshold {
            return Err(DomainError::Configuration(format!(
                "similarity_threshold must not increase from {} ({}) to {} ({})",
                stricter.0, stricter.1.similarity_threshold, looser.0, looser.1.similarity_threshold
            )));
        }
        if looser.1.max_distance_from_fittest < stricter.1.max_distance_from_fittest {
            return Err(DomainError::Configuration(format!(
                "max_distance_from_fittest must not decrease from {} ({}) to {} ({})",
                stricter.0,
                stricter.1.max_distance_from_fittest,
                looser.0,
                looser.1.max_distance_from_fittest
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;

    fn default_manager() -> PressureManager {
        PressureManager::new(Config::default().pressure).unwrap()
    }

    #[test]
    fn test_default_table_is_monotonic() {
        let manager = default_manager();
        let high = manager.get_adjustments(PressureLevel::High).unwrap();
        let medium = manager.get_adjustments(PressureLevel::Medium).unwrap();
        let low = manager.get_adjustments(PressureLevel::Low).unwrap();

        assert!(high.similarity_threshold >= medium.similarity_threshold);
        assert!(medium.similarity_threshold >= low.similarity_threshold);
        assert!(high.max_distance_from_fittest <= medium.max_distance_from_fittest);
        assert!(medium.max_distance_from_fittest <= low.max_distance_from_fittest);
    }

    #[test]
    fn test_missing_level_is_configuration_error() {
        let mut table = Config::default().pressure;
        table.remove(&PressureLevel::Training);
        let manager = PressureManager::new(table).unwrap();

        let err = manager.get_adjustments(PressureLevel::Training).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("training")));
    }

    #[test]
    fn test_rejects_non_monotonic_similarity() {
        let mut table = Config::default().pressure;
        if let Some(low) = table.get_mut(&PressureLevel::Low) {
            low.similarity_threshold = 0.99;
        }
        assert!(matches!(
            PressureManager::new(table),
            Err(DomainError::Configuration(msg)) if msg.contains("similarity_threshold")
        ));
    }

    #[test]
    fn test_rejects_non_monotonic_distance() {
        let mut table = Config::default().pressure;
        if let Some(high) = table.get_mut(&PressureLevel::High) {
            high.max_distance_from_fittest = 0.9;
        }
        assert!(matches!(
            PressureManager::new(table),
            Err(DomainError::Configuration(msg)) if msg.contains("max_distance_from_fittest")
        ));
    }

    #[test]
    fn test_training_exempt_from_ordering() {
        let mut table = Config::default().pressure;
        if let Some(training) = table.get_mut(&PressureLevel::Training) {
            training.similarity_threshold = 0.99;
            training.max_distance_from_fittest = 0.01;
        }
        assert!(PressureManager::new(table).is_ok());
    }

    #[test]
    fn test_partial_table_checks_present_pairs() {
        let mut table = BTreeMap::new();
        table.insert(PressureLevel::High, PressureAdjustments::default_for(PressureLevel::High));
        table.insert(PressureLevel::Low, PressureAdjustments::default_for(PressureLevel::Low));
        let manager = PressureManager::new(table).unwrap();
        assert!(manager.get_adjustments(PressureLevel::Medium).is_err());
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let mut table = Config::default().pressure;
        if let Some(medium) = table.get_mut(&PressureLevel::Medium) {
            medium.specialization_bias = 1.5;
        }
        assert!(PressureManager::new(table).is_err());
    }

    #[test]
    fn test_pure_lookup() {
        let manager = default_manager();
        assert_eq!(
            manager.get_adjustments(PressureLevel::Medium).unwrap(),
            manager.get_adjustments(PressureLevel::Medium).unwrap()
        );
    }
}
