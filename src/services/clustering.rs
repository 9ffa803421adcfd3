//! Clustering & promotion engine.
//!
//! Admission places a variant into a niche of its cluster by embedding
//! distance, re-ranks every active member by fitness and promotes the top one
//! to canonical. Admission is a pure function: it takes the current cluster
//! by reference and returns the next state.
//!
//! Ranking order (first wins):
//! 1. `overall_score` descending, non-finite scores last
//! 2. latency ascending
//! 3. version ascending (earlier version wins)
//! 4. `variant_id` ascending, so equal inputs always rank identically

use chrono::Utc;
use std::cmp::Ordering;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::variant::compare_versions;
use crate::domain::models::{
    rankable_latency, ArtifactVariant, OptimizationCluster, PressureAdjustments, PromotionEvent,
    VariantStatus,
};

/// Distance reported for vectors that cannot be compared.
pub const MAX_DISTANCE: f64 = f64::MAX;

/// Calculate cosine distance between two vectors
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return MAX_DISTANCE;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let mag_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return MAX_DISTANCE;
    }

    // Cosine distance = 1 - cosine_similarity
    (1.0 - dot / (mag_a * mag_b)).max(0.0)
}

/// Total ranking order over variants; `Less` means `a` ranks ahead.
pub fn rank_variants(a: &ArtifactVariant, b: &ArtifactVariant) -> Ordering {
    b.ranking_score()
        .total_cmp(&a.ranking_score())
        .then_with(|| {
            rankable_latency(a.performance.latency_ms)
                .total_cmp(&rankable_latency(b.performance.latency_ms))
        })
        .then_with(|| compare_versions(&a.version, &b.version))
        .then_with(|| a.variant_id.cmp(&b.variant_id))
}

/// Result of admitting one variant.
#[derive(Debug, Clone)]
pub struct Admission {
    pub cluster: OptimizationCluster,
    /// Whether the canonical identity changed.
    pub promoted: bool,
    /// Niche the admitted variant was placed in.
    pub niche: u32,
    /// `false` when the variant seeded a new niche.
    pub joined_existing_niche: bool,
    /// Distance to the nearest pre-existing member, if any.
    pub nearest_distance: Option<f64>,
}

/// Stateless clustering and promotion engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusteringEngine;

impl ClusteringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Admit `new_variant` into `cluster`.
    ///
    /// A variant whose id is already active replaces that member (re-scored
    /// variant). Archived ids are never re-admitted.
    pub fn admit(
        &self,
        cluster: &OptimizationCluster,
        mut new_variant: ArtifactVariant,
        adjustments: &PressureAdjustments,
    ) -> DomainResult<Admission> {
        cluster.validate()?;
        if new_variant.artifact_id != cluster.artifact_id {
            return Err(DomainError::ArtifactMismatch {
                expected: cluster.artifact_id.clone(),
                found: new_variant.artifact_id,
            });
        }
        if cluster.is_archived(&new_variant.variant_id) {
            return Err(DomainError::VariantArchived(new_variant.variant_id));
        }

        let previous_canonical = cluster
            .canonical_variant
            .as_ref()
            .map(|v| v.variant_id.clone());
        let is_update = cluster.contains(&new_variant.variant_id);

        let mut next = cluster.clone();
        let mut members: Vec<ArtifactVariant> = next
            .canonical_variant
            .take()
            .into_iter()
            .chain(std::mem::take(&mut next.alternates))
            .filter(|v| v.variant_id != new_variant.variant_id)
            .collect();

        let nearest = members
            .iter()
            .map(|m| (cosine_distance(&new_variant.embedding, &m.embedding), m.niche))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        let radius = adjustments.niche_radius();
        let (niche, joined) = match nearest {
            Some((distance, niche)) if distance <= radius => (niche, true),
            _ => {
                let niche = next.next_niche;
                next.next_niche += 1;
                (niche, false)
            }
        };
        new_variant.niche = niche;
        let admitted_id = new_variant.variant_id.clone();
        members.push(new_variant);

        members.sort_by(rank_variants);
        let mut ranked = members.into_iter();
        let mut canonical = ranked
            .next()
            .ok_or_else(|| DomainError::InvariantViolation("admission produced no members".to_string()))?;
        canonical.status = VariantStatus::Canonical;
        next.alternates = ranked
            .map(|mut v| {
                v.status = VariantStatus::Alternate;
                v
            })
            .collect();

        let promoted = previous_canonical.as_deref() != Some(canonical.variant_id.as_str());
        if promoted {
            next.promotions.push(PromotionEvent {
                from_variant: previous_canonical,
                to_variant: canonical.variant_id.clone(),
                score: canonical.overall_score(),
                occurred_at: Utc::now(),
            });
        }
        next.canonical_variant = Some(canonical);

        if !is_update {
            next.generation += 1;
        }
        next.updated_at = Utc::now();

        debug!(
            cluster_id = %next.cluster_id,
            variant_id = %admitted_id,
            niche,
            joined_existing_niche = joined,
            promoted,
            size = next.size(),
            "variant admitted"
        );

        Ok(Admission {
            cluster: next,
            promoted,
            niche,
            joined_existing_niche: joined,
            nearest_distance: nearest.map(|(d, _)| d),
        })
    }
}
