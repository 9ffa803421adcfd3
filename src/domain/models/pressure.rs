//! Selection pressure domain models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// Coarse selection pressure level.
///
/// HIGH keeps many narrow niches and tolerates little weakness; LOW keeps a
/// few broad niches and tolerates a lot. TRAINING is for bulk/offline runs
/// and is configured independently of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    #[serde(alias = "granular")]
    High,
    #[serde(alias = "balanced")]
    Medium,
    #[serde(alias = "generic")]
    Low,
    Training,
}

impl PressureLevel {
    /// The levels bound by the monotonicity contract, strictest first.
    pub const ORDERED: [PressureLevel; 3] =
        [PressureLevel::High, PressureLevel::Medium, PressureLevel::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            PressureLevel::High => "high",
            PressureLevel::Medium => "medium",
            PressureLevel::Low => "low",
            PressureLevel::Training => "training",
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            PressureLevel::High => "granular",
            PressureLevel::Medium => "balanced",
            PressureLevel::Low => "generic",
            PressureLevel::Training => "training",
        }
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PressureLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "granular" => Ok(Self::High),
            "medium" | "balanced" => Ok(Self::Medium),
            "low" | "generic" => Ok(Self::Low),
            "training" => Ok(Self::Training),
            other => Err(DomainError::Configuration(format!(
                "unknown pressure level '{other}'"
            ))),
        }
    }
}

/// Concrete thresholds derived from one pressure level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureAdjustments {
    /// Higher means tighter clustering and fewer distinct niches.
    pub similarity_threshold: f64,
    /// Higher means weaker alternates are retained longer.
    pub max_distance_from_fittest: f64,
    /// Floor (canonical included) below which trimming is suspended.
    pub min_cluster_size: usize,
    /// Archive near-duplicate alternates even when within budget.
    pub merge_similar_functions: bool,
    /// Weight in [0, 1] favouring algorithmic/domain deltas over refactors.
    pub specialization_bias: f64,
}

impl PressureAdjustments {
    /// Cosine distance under which two variants share a niche.
    pub fn niche_radius(&self) -> f64 {
        1.0 - self.similarity_threshold
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold {} must be within [0, 1]",
                self.similarity_threshold
            ));
        }
        if self.max_distance_from_fittest < 0.0 || self.max_distance_from_fittest.is_nan() {
            return Err(format!(
                "max_distance_from_fittest {} must be non-negative",
                self.max_distance_from_fittest
            ));
        }
        if self.min_cluster_size == 0 {
            return Err("min_cluster_size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.specialization_bias) {
            return Err(format!(
                "specialization_bias {} must be within [0, 1]",
                self.specialization_bias
            ));
        }
        Ok(())
    }

    /// Default table entry for `level`.
    pub fn default_for(level: PressureLevel) -> Self {
        match level {
            PressureLevel::High => Self {
                similarity_threshold: 0.95,
                max_distance_from_fittest: 0.2,
                min_cluster_size: 1,
                merge_similar_functions: false,
                specialization_bias: 0.8,
            },
            PressureLevel::Medium => Self {
                similarity_threshold: 0.85,
                max_distance_from_fittest: 0.4,
                min_cluster_size: 2,
                merge_similar_functions: false,
                specialization_bias: 0.5,
            },
            PressureLevel::Low => Self {
                similarity_threshold: 0.7,
                max_distance_from_fittest: 0.6,
                min_cluster_size: 3,
                merge_similar_functions: true,
                specialization_bias: 0.2,
            },
            PressureLevel::Training => Self {
                similarity_threshold: 0.8,
                max_distance_from_fittest: 0.5,
                min_cluster_size: 1,
                merge_similar_functions: true,
                specialization_bias: 0.5,
            },
        }
    }
}
