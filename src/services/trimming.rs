//! Trimming / archival policy.
//!
//! After every admission the cluster is trimmed against the pressure-derived
//! retention budget:
//! - an alternate whose score trails the canonical by more than
//!   `max_distance_from_fittest` is archived
//! - with `merge_similar_functions`, an alternate within the niche radius of
//!   a better retained alternate is archived as a near-duplicate
//! - the cluster never shrinks below `min_cluster_size`; when too many
//!   alternates qualify, the lowest-scoring qualifying alternates are the
//!   ones retained to fill the floor
//! - the canonical is never archived, and archival is one-way

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::clustering::{cosine_distance, rank_variants};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArtifactVariant, OptimizationCluster, PressureAdjustments, VariantStatus,
};

/// Tolerance for the fitness-distance boundary; a gap equal to the budget is
/// within budget.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Why an alternate was selected for archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ArchivalReason {
    /// Trails the canonical by more than the budget.
    FitnessDistance { distance: f64 },
    /// Near-duplicate of a better alternate.
    NearDuplicate { of: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalDecision {
    pub variant_id: String,
    pub reason: ArchivalReason,
}

/// Result of one trim pass.
#[derive(Debug, Clone)]
pub struct TrimOutcome {
    pub cluster: OptimizationCluster,
    pub archived_ids: Vec<String>,
    /// Archived records, with status ARCHIVED, for the external store.
    pub archived: Vec<ArtifactVariant>,
    pub decisions: Vec<ArchivalDecision>,
    /// Qualifying alternates kept only to satisfy the size floor.
    pub floor_protected: Vec<String>,
}

/// Pressure-driven archival policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimmingPolicy;

impl TrimmingPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Trim `cluster` under `adjustments`.
    pub fn trim(
        &self,
        cluster: &OptimizationCluster,
        adjustments: &PressureAdjustments,
    ) -> DomainResult<TrimOutcome> {
        cluster.validate()?;
        let mut next = cluster.clone();
        let Some(canonical) = next.canonical_variant.as_ref() else {
            return Ok(TrimOutcome::unchanged(next));
        };
        let fittest = canonical.ranking_score();

        next.alternates.sort_by(rank_variants);

        let mut candidates: Vec<(usize, ArchivalReason)> = Vec::new();
        let mut retained: Vec<usize> = Vec::new();
        let radius = adjustments.niche_radius();

        for (idx, alternate) in next.alternates.iter().enumerate() {
            let distance = fittest - alternate.ranking_score();
            let budget = adjustments.max_distance_from_fittest + BOUNDARY_EPSILON;
            if distance.is_nan() || distance > budget {
                candidates.push((idx, ArchivalReason::FitnessDistance { distance }));
                continue;
            }

            if adjustments.merge_similar_functions {
                let duplicate_of = retained.iter().find(|&&kept| {
                    cosine_distance(&next.alternates[kept].embedding, &alternate.embedding) <= radius
                });
                if let Some(&kept) = duplicate_of {
                    candidates.push((
                        idx,
                        ArchivalReason::NearDuplicate {
                            of: next.alternates[kept].variant_id.clone(),
                        },
                    ));
                    continue;
                }
            }
            retained.push(idx);
        }

        // Candidates are in rank order, so the tail holds the lowest scores.
        let allowed = next.size().saturating_sub(adjustments.min_cluster_size);
        let keep = candidates.len().saturating_sub(allowed);
        let protected = candidates.split_off(candidates.len() - keep);
        let floor_protected: Vec<String> = protected
            .iter()
            .map(|(idx, _)| next.alternates[*idx].variant_id.clone())
            .collect();

        let archive_idx: BTreeSet<usize> = candidates.iter().map(|(idx, _)| *idx).collect();
        let decisions: Vec<ArchivalDecision> = candidates
            .into_iter()
            .map(|(idx, reason)| ArchivalDecision {
                variant_id: next.alternates[idx].variant_id.clone(),
                reason,
            })
            .collect();

        let mut archived = Vec::with_capacity(archive_idx.len());
        let mut kept = Vec::with_capacity(next.alternates.len() - archive_idx.len());
        for (idx, mut alternate) in std::mem::take(&mut next.alternates).into_iter().enumerate() {
            if archive_idx.contains(&idx) {
                alternate.status = VariantStatus::Archived;
                next.archived_ids.insert(alternate.variant_id.clone());
                archived.push(alternate);
            } else {
                kept.push(alternate);
            }
        }
        next.alternates = kept;

        let archived_ids: Vec<String> = archived.iter().map(|v| v.variant_id.clone()).collect();
        if !archived_ids.is_empty() {
            next.updated_at = Utc::now();
            info!(
                cluster_id = %next.cluster_id,
                archived = archived_ids.len(),
                remaining = next.size(),
                floor_protected = floor_protected.len(),
                "cluster trimmed"
            );
        } else {
            debug!(cluster_id = %next.cluster_id, "trim archived nothing");
        }

        Ok(TrimOutcome {
            cluster: next,
            archived_ids,
            archived,
            decisions,
            floor_protected,
        })
    }

    /// Archive a single alternate explicitly.
    ///
    /// Archiving an already archived id is a no-op. The canonical can never
    /// be archived.
    pub fn archive(
        &self,
        cluster: &OptimizationCluster,
        variant_id: &str,
    ) -> DomainResult<(OptimizationCluster, Option<ArtifactVariant>)> {
        if cluster.is_archived(variant_id) {
            return Ok((cluster.clone(), None));
        }
        if cluster
            .canonical_variant
            .as_ref()
            .is_some_and(|c| c.variant_id == variant_id)
        {
            return Err(DomainError::ValidationFailed(format!(
                "variant {variant_id} is canonical and cannot be archived"
            )));
        }

        let mut next = cluster.clone();
        let position = next
            .alternates
            .iter()
            .position(|v| v.variant_id == variant_id)
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "variant {variant_id} is not a member of cluster {}",
                    cluster.cluster_id
                ))
            })?;

        let mut variant = next.alternates.remove(position);
        variant.status = VariantStatus::Archived;
        next.archived_ids.insert(variant.variant_id.clone());
        next.updated_at = Utc::now();
        Ok((next, Some(variant)))
    }
}

impl TrimOutcome {
    fn unchanged(cluster: OptimizationCluster) -> Self {
        Self {
            cluster,
            archived_ids: Vec::new(),
            archived: Vec::new(),
            decisions: Vec::new(),
            floor_protected: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FitnessEvaluation, PressureLevel, Verdict};
    use crate::services::clustering::ClusteringEngine;

    fn variant(id: &str, score: f64, embedding: Vec<f32>) -> ArtifactVariant {
        ArtifactVariant::new("render", "1.0", format!("impl {id}"), embedding)
            .with_id(id)
            .with_fitness(FitnessEvaluation {
                overall_score: score,
                quality_score: score,
                speed_score: 0.5,
                correctness_score: 1.0,
                verdict: Verdict::Good,
                latency_ms: 100.0,
            })
    }

    fn build(variants: Vec<ArtifactVariant>) -> OptimizationCluster {
        let engine = ClusteringEngine::new();
        let adj = PressureAdjustments::default_for(PressureLevel::Medium);
        variants
            .into_iter()
            .fold(OptimizationCluster::new("c", "render"), |cluster, v| {
                engine.admit(&cluster, v, &adj).unwrap().cluster
            })
    }

    fn high() -> PressureAdjustments {
        PressureAdjustments::default_for(PressureLevel::High)
    }

    fn low() -> PressureAdjustments {
        PressureAdjustments {
            min_cluster_size: 1,
            merge_similar_functions: false,
            ..PressureAdjustments::default_for(PressureLevel::Low)
        }
    }

    #[test]
    fn test_high_pressure_archives_distant_alternate() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("weak", 0.5, vec![0.0, 1.0]),
        ]);
        let outcome = TrimmingPolicy::new().trim(&cluster, &high()).unwrap();

        assert_eq!(outcome.archived_ids, vec!["weak".to_string()]);
        assert!(outcome.cluster.alternates.is_empty());
        assert!(outcome.cluster.is_archived("weak"));
        assert_eq!(outcome.archived[0].status, VariantStatus::Archived);
        assert!(matches!(
            outcome.decisions[0].reason,
            ArchivalReason::FitnessDistance { distance } if (distance - 0.4).abs() < 1e-9
        ));
        assert!(outcome.cluster.validate().is_ok());
    }

    #[test]
    fn test_non_finite_alternate_is_archived() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("broken", f64::NAN, vec![0.0, 1.0]),
        ]);
        assert_eq!(cluster.canonical().unwrap().variant_id, "best");

        let outcome = TrimmingPolicy::new().trim(&cluster, &low()).unwrap();
        assert_eq!(outcome.archived_ids, vec!["broken".to_string()]);
        assert!(outcome.cluster.validate().is_ok());
    }

    #[test]
    fn test_low_pressure_retains_alternate() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("weak", 0.5, vec![0.0, 1.0]),
        ]);
        let outcome = TrimmingPolicy::new().trim(&cluster, &low()).unwrap();

        assert!(outcome.archived_ids.is_empty());
        assert_eq!(outcome.cluster.alternates.len(), 1);
    }

    #[test]
    fn test_boundary_gap_is_retained() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("edge", 0.7, vec![0.0, 1.0]),
        ]);
        let outcome = TrimmingPolicy::new().trim(&cluster, &high()).unwrap();
        assert!(outcome.archived_ids.is_empty());
    }

    #[test]
    fn test_floor_retains_lowest_scoring_candidates() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("mid", 0.6, vec![0.0, 1.0]),
            variant("low", 0.4, vec![1.0, 1.0]),
            variant("lowest", 0.2, vec![1.0, -1.0]),
        ]);
        let adj = PressureAdjustments {
            min_cluster_size: 3,
            ..high()
        };
        let outcome = TrimmingPolicy::new().trim(&cluster, &adj).unwrap();

        assert_eq!(outcome.archived_ids, vec!["mid".to_string()]);
        assert_eq!(outcome.floor_protected, vec!["low".to_string(), "lowest".to_string()]);
        assert_eq!(outcome.cluster.size(), 3);
    }

    #[test]
    fn test_below_floor_suspends_trimming() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("weak", 0.1, vec![0.0, 1.0]),
        ]);
        let adj = PressureAdjustments {
            min_cluster_size: 5,
            ..high()
        };
        let outcome = TrimmingPolicy::new().trim(&cluster, &adj).unwrap();
        assert!(outcome.archived_ids.is_empty());
        assert_eq!(outcome.cluster.size(), 2);
    }

    #[test]
    fn test_merge_archives_near_duplicate() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("twin-a", 0.8, vec![0.0, 1.0]),
            variant("twin-b", 0.75, vec![0.01, 1.0]),
        ]);
        let adj = PressureAdjustments {
            merge_similar_functions: true,
            min_cluster_size: 1,
            ..PressureAdjustments::default_for(PressureLevel::Low)
        };
        let outcome = TrimmingPolicy::new().trim(&cluster, &adj).unwrap();

        assert_eq!(outcome.archived_ids, vec!["twin-b".to_string()]);
        assert!(matches!(
            &outcome.decisions[0].reason,
            ArchivalReason::NearDuplicate { of } if of == "twin-a"
        ));
    }

    #[test]
    fn test_canonical_never_archived() {
        let cluster = build(vec![variant("solo", 0.1, vec![1.0, 0.0])]);
        let outcome = TrimmingPolicy::new().trim(&cluster, &high()).unwrap();
        assert_eq!(outcome.cluster.canonical().unwrap().variant_id, "solo");

        let err = TrimmingPolicy::new().archive(&cluster, "solo").unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[test]
    fn test_explicit_archive_is_idempotent() {
        let cluster = build(vec![
            variant("best", 0.9, vec![1.0, 0.0]),
            variant("alt", 0.8, vec![0.0, 1.0]),
        ]);
        let policy = TrimmingPolicy::new();
        let (once, archived) = policy.archive(&cluster, "alt").unwrap();
        assert!(archived.is_some());

        let (twice, again) = policy.archive(&once, "alt").unwrap();
        assert!(again.is_none());
        assert_eq!(once, twice);
        assert_eq!(twice.archived_ids.len(), 1);
    }

    #[test]
    fn test_trim_empty_cluster() {
        let cluster = OptimizationCluster::new("c", "render");
        let outcome = TrimmingPolicy::new().trim(&cluster, &high()).unwrap();
        assert!(outcome.cluster.is_empty());
        assert!(outcome.archived_ids.is_empty());
    }
}
