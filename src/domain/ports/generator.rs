//! Variant generator port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArtifactVariant, GeneratedVariant, GenerationConstraints};

/// External code/prompt generation service.
#[async_trait]
pub trait VariantGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce new content for `artifact_id`.
    ///
    /// `current_canonical` is `None` when seeding an empty cluster.
    async fn generate_variant(
        &self,
        artifact_id: &str,
        current_canonical: Option<&ArtifactVariant>,
        constraints: &GenerationConstraints,
    ) -> DomainResult<GeneratedVariant>;
}
