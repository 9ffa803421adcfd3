//! Optimization cluster domain model.
//!
//! A cluster is the whole population of variants for one artifact. Clusters
//! are never deleted; archival happens per variant and archived ids stay on
//! the cluster so they can be looked up in the external store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::variant::{ArtifactKind, ArtifactVariant, VariantStatus};
use crate::domain::errors::{DomainError, DomainResult};

/// Recorded whenever the canonical identity of a cluster changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEvent {
    /// Previous canonical, `None` for the first admission.
    pub from_variant: Option<String>,
    pub to_variant: String,
    pub score: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Population statistics reported after an optimization run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterStatistics {
    pub total: usize,
    pub active: usize,
    pub archived: usize,
    pub niches: usize,
    /// Median overall score of active members, `None` when empty.
    pub median_fitness: Option<f64>,
}

/// The population sharing one artifact identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationCluster {
    pub cluster_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub artifact_kind: ArtifactKind,
    pub canonical_variant: Option<ArtifactVariant>,
    #[serde(default)]
    pub alternates: Vec<ArtifactVariant>,
    #[serde(default)]
    pub archived_ids: BTreeSet<String>,
    #[serde(default)]
    pub promotions: Vec<PromotionEvent>,
    /// Next niche id to hand out.
    #[serde(default)]
    pub next_niche: u32,
    /// Number of variants generated into this cluster so far.
    #[serde(default)]
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OptimizationCluster {
    pub fn new(cluster_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            cluster_id: cluster_id.into(),
            artifact_id: artifact_id.into(),
            artifact_kind: ArtifactKind::default(),
            canonical_variant: None,
            alternates: Vec::new(),
            archived_ids: BTreeSet::new(),
            promotions: Vec::new(),
            next_niche: 0,
            generation: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.artifact_kind = kind;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.canonical_variant.is_none() && self.alternates.is_empty()
    }

    /// Active members: canonical plus alternates.
    pub fn size(&self) -> usize {
        usize::from(self.canonical_variant.is_some()) + self.alternates.len()
    }

    pub fn canonical(&self) -> DomainResult<&ArtifactVariant> {
        self.canonical_variant
            .as_ref()
            .ok_or_else(|| DomainError::EmptyCluster(self.cluster_id.clone()))
    }

    /// Iterate over all active members, canonical first.
    pub fn members(&self) -> impl Iterator<Item = &ArtifactVariant> {
        self.canonical_variant.iter().chain(self.alternates.iter())
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.members().any(|v| v.variant_id == variant_id)
    }

    pub fn is_archived(&self, variant_id: &str) -> bool {
        self.archived_ids.contains(variant_id)
    }

    /// Version string for the next generated variant.
    pub fn next_version(&self) -> String {
        format!("1.{}", self.generation + 1)
    }

    /// Check every structural invariant of the cluster.
    ///
    /// Violations are reported, never repaired.
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(canonical) = &self.canonical_variant {
            if canonical.status != VariantStatus::Canonical {
                return Err(DomainError::InvariantViolation(format!(
                    "canonical slot of cluster {} holds variant {} with status {}",
                    self.cluster_id, canonical.variant_id, canonical.status
                )));
            }
        } else if !self.alternates.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "cluster {} has {} alternates but no canonical",
                self.cluster_id,
                self.alternates.len()
            )));
        }

        let mut seen = HashSet::new();
        for variant in self.members() {
            if variant.artifact_id != self.artifact_id {
                return Err(DomainError::InvariantViolation(format!(
                    "variant {} belongs to artifact {} inside cluster for {}",
                    variant.variant_id, variant.artifact_id, self.artifact_id
                )));
            }
            if !seen.insert(variant.variant_id.as_str()) {
                return Err(DomainError::InvariantViolation(format!(
                    "variant {} appears twice in cluster {}",
                    variant.variant_id, self.cluster_id
                )));
            }
            if self.archived_ids.contains(&variant.variant_id) {
                return Err(DomainError::InvariantViolation(format!(
                    "archived variant {} is still active in cluster {}",
                    variant.variant_id, self.cluster_id
                )));
            }
        }

        for alternate in &self.alternates {
            match alternate.status {
                VariantStatus::Alternate => {}
                VariantStatus::Canonical => {
                    return Err(DomainError::InvariantViolation(format!(
                        "more than one CANONICAL in cluster {} (extra: {})",
                        self.cluster_id, alternate.variant_id
                    )));
                }
                VariantStatus::Archived => {
                    return Err(DomainError::InvariantViolation(format!(
                        "ARCHIVED variant {} found among alternates of cluster {}",
                        alternate.variant_id, self.cluster_id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn statistics(&self) -> ClusterStatistics {
        let mut scores: Vec<f64> = self.members().map(ArtifactVariant::overall_score).collect();
        scores.sort_by(f64::total_cmp);

        let median_fitness = match scores.len() {
            0 => None,
            n if n % 2 == 1 => Some(scores[n / 2]),
            n => Some((scores[n / 2 - 1] + scores[n / 2]) / 2.0),
        };

        let niches: BTreeSet<u32> = self.members().map(|v| v.niche).collect();

        ClusterStatistics {
            total: self.size() + self.archived_ids.len(),
            active: self.size(),
            archived: self.archived_ids.len(),
            niches: niches.len(),
            median_fitness,
        }
    }
}
