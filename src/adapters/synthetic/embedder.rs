use async_trait::async_trait;

use super::fingerprint;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::EmbeddingProvider;

/// Feature-hashing embedder: each token adds a signed unit to one dimension.
///
/// Contents that share most tokens land close together, so near-identical
/// variants share a niche.
pub struct SyntheticEmbedder {
    dimension: usize,
}

impl SyntheticEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for SyntheticEmbedder {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl EmbeddingProvider for SyntheticEmbedder {
    fn name(&self) -> &'static str {
        "synthetic_embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, content: &str) -> DomainResult<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        let mut tokens = 0usize;
        for token in content.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fingerprint(token.as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(DomainError::ValidationFailed(
                "cannot embed content without tokens".to_string(),
            ));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clustering::cosine_distance;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = SyntheticEmbedder::new(8);
        let a = embedder.embed("fn parse(input) { split lines }").await.unwrap();
        let b = embedder.embed("fn parse(input) { split lines }").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn test_similar_content_is_close() {
        let embedder = SyntheticEmbedder::default();
        let base = "fn parse input split lines trim whitespace collect rows";
        let a = embedder.embed(base).await.unwrap();
        let b = embedder.embed(&format!("{base} rows")).await.unwrap();
        let c = embedder.embed("prompt summarize the following article briefly").await.unwrap();
        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let embedder = SyntheticEmbedder::default();
        assert!(embedder.embed("  {} ").await.is_err());
    }
}
