//! Optimization loop domain models: strategies, constraints, iteration
//! results and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::cluster::{ClusterStatistics, PromotionEvent};
use super::fitness::FitnessEvaluation;
use super::learning::NodeLearning;
use super::pressure::PressureLevel;
use super::variant::{ArtifactVariant, DeltaType, SemanticDelta};
use crate::domain::errors::DomainError;

/// Risk ceiling applied to incremental generation.
pub const INCREMENTAL_MAX_RISK: f64 = 0.3;

/// How an optimization run explores the variant space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    /// One variant per iteration, biased by the best learned recommendation.
    BestOfBreed,
    /// Small low-risk deltas from the current canonical.
    Incremental,
    /// Unconstrained, high-risk/high-benefit departures.
    Radical,
    /// Incremental and radical on alternating iterations.
    Hybrid,
}

impl OptimizationStrategy {
    pub const ALL: [OptimizationStrategy; 4] = [
        OptimizationStrategy::BestOfBreed,
        OptimizationStrategy::Incremental,
        OptimizationStrategy::Radical,
        OptimizationStrategy::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::BestOfBreed => "best_of_breed",
            OptimizationStrategy::Incremental => "incremental",
            OptimizationStrategy::Radical => "radical",
            OptimizationStrategy::Hybrid => "hybrid",
        }
    }

    /// Generation mode used on the zero-based `iteration`.
    ///
    /// Purely a function of the strategy and the iteration index.
    pub fn mode_for(&self, iteration: usize) -> GenerationMode {
        match self {
            OptimizationStrategy::BestOfBreed => GenerationMode::Guided,
            OptimizationStrategy::Incremental => GenerationMode::Incremental,
            OptimizationStrategy::Radical => GenerationMode::Radical,
            OptimizationStrategy::Hybrid => {
                if iteration % 2 == 0 {
                    GenerationMode::Incremental
                } else {
                    GenerationMode::Radical
                }
            }
        }
    }
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "best_of_breed" => Ok(Self::BestOfBreed),
            "incremental" => Ok(Self::Incremental),
            "radical" => Ok(Self::Radical),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(DomainError::Configuration(format!(
                "unknown optimization strategy '{other}'"
            ))),
        }
    }
}

/// What kind of variant the generator is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// First variant of an empty cluster; no parent.
    Seed,
    Guided,
    Incremental,
    Radical,
}

/// Constraints handed to the external generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConstraints {
    pub mode: GenerationMode,
    /// Ceiling on any delta's risk, `None` for unconstrained.
    pub max_risk: Option<f64>,
    /// Allowed delta types, empty for any.
    pub allowed_delta_types: Vec<DeltaType>,
    /// Recommendation carried over from hierarchical learning.
    pub hint: Option<String>,
    pub specialization_bias: f64,
}

impl GenerationConstraints {
    pub fn for_mode(mode: GenerationMode, specialization_bias: f64) -> Self {
        let (max_risk, allowed_delta_types) = match mode {
            GenerationMode::Incremental => {
                (Some(INCREMENTAL_MAX_RISK), DeltaType::LOW_RISK.to_vec())
            }
            GenerationMode::Seed | GenerationMode::Guided | GenerationMode::Radical => {
                (None, Vec::new())
            }
        };
        Self {
            mode,
            max_risk,
            allowed_delta_types,
            hint: None,
            specialization_bias,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Check generated deltas against the constraints.
    ///
    /// A delta whose risk is not a finite number is rejected in every mode.
    pub fn check(&self, deltas: &[SemanticDelta]) -> Result<(), DomainError> {
        for delta in deltas {
            if !delta.risk.is_finite() {
                return Err(DomainError::ConstraintViolation(format!(
                    "delta '{}' has no usable risk estimate ({})",
                    delta.description, delta.risk
                )));
            }
            if let Some(max_risk) = self.max_risk {
                if delta.risk > max_risk {
                    return Err(DomainError::ConstraintViolation(format!(
                        "delta '{}' has risk {:.2} above ceiling {:.2}",
                        delta.description, delta.risk, max_risk
                    )));
                }
            }
            if !self.allowed_delta_types.is_empty()
                && !self.allowed_delta_types.contains(&delta.delta_type)
            {
                return Err(DomainError::ConstraintViolation(format!(
                    "delta type {:?} not allowed in {:?} mode",
                    delta.delta_type, self.mode
                )));
            }
        }
        Ok(())
    }
}

/// Output of the external generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVariant {
    pub content: String,
    #[serde(default)]
    pub semantic_deltas: Vec<SemanticDelta>,
}

/// Outcome of one iteration of the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// One-based iteration number.
    pub iteration: usize,
    pub mode: GenerationMode,
    pub variant_id: Option<String>,
    pub promoted: bool,
    pub fitness: Option<FitnessEvaluation>,
    #[serde(default)]
    pub archived_ids: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    /// Reason the iteration was abandoned, if it was.
    pub error: Option<String>,
}

impl IterationResult {
    pub fn failed(iteration: usize, mode: GenerationMode, error: impl Into<String>) -> Self {
        Self {
            iteration,
            mode,
            variant_id: None,
            promoted: false,
            fitness: None,
            archived_ids: Vec::new(),
            insights: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Overall status of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    MaxIterations,
    Plateau,
    InvariantViolation,
    Configuration,
    AllFailed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::MaxIterations => "max_iterations",
            Termination::Plateau => "plateau",
            Termination::InvariantViolation => "invariant_violation",
            Termination::Configuration => "configuration",
            Termination::AllFailed => "all_failed",
        }
    }
}

/// Report returned by every optimization run, including failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub cluster_id: String,
    pub strategy: Option<OptimizationStrategy>,
    pub pressure_level: Option<PressureLevel>,
    pub status: RunStatus,
    pub termination: Termination,
    /// Human-readable reason for anything other than a full run.
    pub reason: Option<String>,
    pub iterations: Vec<IterationResult>,
    pub promotions: Vec<PromotionEvent>,
    pub final_canonical: Option<ArtifactVariant>,
    pub statistics: ClusterStatistics,
    pub learned_patterns: Vec<NodeLearning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationReport {
    /// Report for a run that could not start.
    pub fn failed(cluster_id: impl Into<String>, termination: Termination, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            cluster_id: cluster_id.into(),
            strategy: None,
            pressure_level: None,
            status: RunStatus::Failed,
            termination,
            reason: Some(reason.into()),
            iterations: Vec::new(),
            promotions: Vec::new(),
            final_canonical: None,
            statistics: ClusterStatistics::default(),
            learned_patterns: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn promotion_count(&self) -> usize {
        self.iterations.iter().filter(|i| i.promoted).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "best-of-breed".parse::<OptimizationStrategy>().unwrap(),
            OptimizationStrategy::BestOfBreed
        );
        assert_eq!("Hybrid".parse::<OptimizationStrategy>().unwrap(), OptimizationStrategy::Hybrid);
        assert!(matches!(
            "genetic".parse::<OptimizationStrategy>(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_hybrid_alternates() {
        let modes: Vec<_> = (0..4).map(|i| OptimizationStrategy::Hybrid.mode_for(i)).collect();
        assert_eq!(
            modes,
            vec![
                GenerationMode::Incremental,
                GenerationMode::Radical,
                GenerationMode::Incremental,
                GenerationMode::Radical,
            ]
        );
    }

    #[test]
    fn test_incremental_constraints_reject_risky_delta() {
        let constraints = GenerationConstraints::for_mode(GenerationMode::Incremental, 0.5);
        let safe = vec![SemanticDelta::new(DeltaType::Refactor, "rename", 0.1, 0.1)];
        let risky = vec![SemanticDelta::new(DeltaType::Refactor, "rewrite loop", 0.4, 0.6)];
        let wrong_type = vec![SemanticDelta::new(DeltaType::Algorithm, "new algo", 0.4, 0.1)];

        assert!(constraints.check(&safe).is_ok());
        assert!(matches!(
            constraints.check(&risky),
            Err(DomainError::ConstraintViolation(_))
        ));
        assert!(matches!(
            constraints.check(&wrong_type),
            Err(DomainError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_non_finite_risk_rejected() {
        let mut unknown = SemanticDelta::new(DeltaType::Refactor, "inline", 0.2, 0.1);
        unknown.risk = f64::NAN;
        let deltas = vec![unknown];

        for mode in [GenerationMode::Incremental, GenerationMode::Radical] {
            let constraints = GenerationConstraints::for_mode(mode, 0.5);
            assert!(matches!(
                constraints.check(&deltas),
                Err(DomainError::ConstraintViolation(msg)) if msg.contains("risk")
            ));
        }
    }

    #[test]
    fn test_radical_constraints_accept_anything() {
        let constraints = GenerationConstraints::for_mode(GenerationMode::Radical, 0.5);
        let deltas = vec![SemanticDelta::new(DeltaType::Restructure, "rewrite", 0.9, 0.95)];
        assert!(constraints.check(&deltas).is_ok());
    }
}
