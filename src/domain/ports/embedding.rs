//! Embedding provider port for semantic vector generation.
//!
//! The optimizer treats embeddings as opaque fixed-length vectors and only
//! ever computes distances between them.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Trait for external embedding services.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "synthetic").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a variant's content.
    async fn embed(&self, content: &str) -> DomainResult<Vec<f32>>;
}
