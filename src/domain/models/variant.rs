//! Artifact variant domain model.
//!
//! A variant is one concrete, versioned implementation of an artifact. The
//! content is opaque to the optimizer; only the embedding, the measured
//! performance and the fitness evaluation drive decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::fitness::{rankable_score, FitnessEvaluation};
use crate::domain::errors::DomainError;

/// The kind of logical unit being optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    #[default]
    Function,
    Prompt,
    Workflow,
    SubWorkflow,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Function => "function",
            ArtifactKind::Prompt => "prompt",
            ArtifactKind::Workflow => "workflow",
            ArtifactKind::SubWorkflow => "sub_workflow",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "function" => Ok(Self::Function),
            "prompt" => Ok(Self::Prompt),
            "workflow" => Ok(Self::Workflow),
            "sub_workflow" | "subworkflow" => Ok(Self::SubWorkflow),
            other => Err(DomainError::Configuration(format!(
                "unknown artifact kind '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of a variant inside its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantStatus {
    Canonical,
    Alternate,
    Archived,
}

impl fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantStatus::Canonical => "CANONICAL",
            VariantStatus::Alternate => "ALTERNATE",
            VariantStatus::Archived => "ARCHIVED",
        };
        f.write_str(s)
    }
}

/// Measured performance of a variant.
///
/// `success_rate` and `test_coverage` are normalized to [0, 1]; latency and
/// memory are raw units and only ever compared relatively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub latency_ms: f64,
    pub memory_mb: f64,
    pub success_rate: f64,
    pub test_coverage: f64,
}

/// Category of change a semantic delta describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaType {
    Algorithm,
    DomainSpecific,
    Performance,
    Refactor,
    ErrorHandling,
    Documentation,
    Restructure,
}

impl DeltaType {
    /// Delta types an incremental step may carry.
    pub const LOW_RISK: [DeltaType; 4] = [
        DeltaType::Refactor,
        DeltaType::Performance,
        DeltaType::ErrorHandling,
        DeltaType::Documentation,
    ];

    /// Algorithmic or domain-specific improvements, as opposed to generic
    /// refactors. Weighted by the pressure level's specialization bias.
    pub fn is_specialized(&self) -> bool {
        matches!(self, DeltaType::Algorithm | DeltaType::DomainSpecific)
    }

    pub fn is_low_risk(&self) -> bool {
        Self::LOW_RISK.contains(self)
    }
}

/// Why a variant differs from its parent. Advisory metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticDelta {
    pub delta_type: DeltaType,
    pub description: String,
    #[serde(default)]
    pub impacted_areas: Vec<String>,
    /// Estimated benefit in [0, 1].
    pub estimated_benefit: f64,
    /// Estimated risk in [0, 1].
    pub risk: f64,
}

impl SemanticDelta {
    pub fn new(delta_type: DeltaType, description: impl Into<String>, benefit: f64, risk: f64) -> Self {
        Self {
            delta_type,
            description: description.into(),
            impacted_areas: Vec::new(),
            estimated_benefit: benefit.clamp(0.0, 1.0),
            risk: risk.clamp(0.0, 1.0),
        }
    }

    /// Benefit scaled by how much the current pressure favours specialization.
    ///
    /// With `bias = 0.5` every delta type counts equally.
    pub fn weighted_benefit(&self, specialization_bias: f64) -> f64 {
        let bias = specialization_bias.clamp(0.0, 1.0);
        let weight = if self.delta_type.is_specialized() {
            bias
        } else {
            1.0 - bias
        };
        self.estimated_benefit * weight * 2.0
    }
}

/// One candidate implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVariant {
    pub variant_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Source text, prompt or workflow definition. Never interpreted here.
    pub content: String,
    pub embedding: Vec<f32>,
    pub status: VariantStatus,
    #[serde(default)]
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub semantic_deltas: Vec<SemanticDelta>,
    /// Latest fitness evaluation; unscored variants rank last.
    #[serde(default)]
    pub fitness: Option<FitnessEvaluation>,
    /// Niche assigned by the clustering engine.
    #[serde(default)]
    pub niche: u32,
    pub created_at: DateTime<Utc>,
}

impl ArtifactVariant {
    pub fn new(
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            variant_id: Uuid::new_v4().to_string(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            content: content.into(),
            embedding,
            status: VariantStatus::Alternate,
            performance: PerformanceMetrics::default(),
            semantic_deltas: Vec::new(),
            fitness: None,
            niche: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = variant_id.into();
        self
    }

    pub fn with_fitness(mut self, fitness: FitnessEvaluation) -> Self {
        self.performance.latency_ms = fitness.latency_ms;
        self.fitness = Some(fitness);
        self
    }

    pub fn with_performance(mut self, performance: PerformanceMetrics) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_deltas(mut self, deltas: Vec<SemanticDelta>) -> Self {
        self.semantic_deltas = deltas;
        self
    }

    /// Overall fitness score, `0.0` when unscored.
    pub fn overall_score(&self) -> f64 {
        self.fitness.as_ref().map_or(0.0, |f| f.overall_score)
    }

    /// Overall score for ordering; a NaN or infinite score ranks last.
    pub fn ranking_score(&self) -> f64 {
        rankable_score(self.overall_score())
    }

    pub fn is_canonical(&self) -> bool {
        self.status == VariantStatus::Canonical
    }

    /// Highest risk among the variant's deltas.
    pub fn max_delta_risk(&self) -> f64 {
        self.semantic_deltas
            .iter()
            .map(|d| d.risk)
            .fold(0.0, f64::max)
    }
}

/// Compare two version strings component-wise.
///
/// Components are split on `.`, `-` and `_`; numeric components compare
/// numerically, anything else lexically. A leading `v` is ignored.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> Vec<String> {
        s.trim_start_matches(['v', 'V'])
            .split(['.', '-', '_'])
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}
