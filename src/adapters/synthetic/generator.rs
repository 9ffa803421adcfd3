use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{fingerprint, unit};
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ArtifactVariant, DeltaType, GeneratedVariant, GenerationConstraints, GenerationMode,
    SemanticDelta, INCREMENTAL_MAX_RISK,
};
use crate::domain::ports::VariantGenerator;

/// Generator that emits templated content with deltas matching the mode.
///
/// Incremental output always respects the incremental risk ceiling, so runs
/// driven by this generator never trip constraint checks.
#[derive(Default)]
pub struct SyntheticGenerator {
    generated: AtomicU64,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variants produced so far.
    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::SeqCst)
    }

    fn deltas(mode: GenerationMode, n: u64, hint: Option<&str>) -> Vec<SemanticDelta> {
        let roll = unit(fingerprint(&n.to_le_bytes()));
        match mode {
            GenerationMode::Seed => Vec::new(),
            GenerationMode::Incremental => {
                let delta_type = DeltaType::LOW_RISK[(n % DeltaType::LOW_RISK.len() as u64) as usize];
                vec![SemanticDelta::new(
                    delta_type,
                    format!("{delta_type:?} pass {n}").to_lowercase(),
                    0.1 + roll * 0.2,
                    roll * INCREMENTAL_MAX_RISK,
                )]
            }
            GenerationMode::Radical => {
                let delta_type = if n % 2 == 0 {
                    DeltaType::Algorithm
                } else {
                    DeltaType::Restructure
                };
                vec![SemanticDelta::new(
                    delta_type,
                    format!("rewrite {n}"),
                    0.5 + roll * 0.5,
                    0.5 + roll * 0.5,
                )]
            }
            GenerationMode::Guided => vec![SemanticDelta::new(
                DeltaType::DomainSpecific,
                match hint {
                    Some(hint) => format!("apply learned approach from {hint}"),
                    None => "domain tuning".to_string(),
                },
                0.4,
                0.2,
            )],
        }
    }
}

#[async_trait]
impl VariantGenerator for SyntheticGenerator {
    fn name(&self) -> &'static str {
        "synthetic_generator"
    }

    async fn generate_variant(
        &self,
        artifact_id: &str,
        current_canonical: Option<&ArtifactVariant>,
        constraints: &GenerationConstraints,
    ) -> DomainResult<GeneratedVariant> {
        let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        let parent = current_canonical.map_or("none", |c| c.variant_id.as_str());
        let mut content = format!(
            "artifact {artifact_id}\nmode {:?}\nparent {parent}\ncandidate {n}\n",
            constraints.mode
        );
        if let Some(hint) = &constraints.hint {
            content.push_str(&format!("hint {hint}\n"));
        }
        if let Some(canonical) = current_canonical {
            content.push_str(&canonical.content);
        }

        debug!(artifact_id, n, mode = ?constraints.mode, "synthetic variant generated");
        Ok(GeneratedVariant {
            content,
            semantic_deltas: Self::deltas(constraints.mode, n, constraints.hint.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_modes_produce_matching_deltas() {
        let generator = SyntheticGenerator::new();

        let seed = generator
            .generate_variant("parse", None, &GenerationConstraints::for_mode(GenerationMode::Seed, 0.5))
            .await
            .unwrap();
        assert!(seed.semantic_deltas.is_empty());
        assert!(seed.content.contains("parent none"));

        for _ in 0..8 {
            let constraints = GenerationConstraints::for_mode(GenerationMode::Incremental, 0.5);
            let step = generator.generate_variant("parse", None, &constraints).await.unwrap();
            assert!(constraints.check(&step.semantic_deltas).is_ok());
        }

        let radical = generator
            .generate_variant("parse", None, &GenerationConstraints::for_mode(GenerationMode::Radical, 0.5))
            .await
            .unwrap();
        assert!(radical.semantic_deltas[0].risk >= 0.5);
        assert_eq!(generator.generated(), 10);
    }

    #[tokio::test]
    async fn test_guided_carries_hint() {
        let generator = SyntheticGenerator::new();
        let constraints =
            GenerationConstraints::for_mode(GenerationMode::Guided, 0.8).with_hint("variant-7");
        let out = generator.generate_variant("parse", None, &constraints).await.unwrap();
        assert!(out.content.contains("hint variant-7"));
        assert_eq!(out.semantic_deltas[0].delta_type, DeltaType::DomainSpecific);
    }
}
