//! Execution harness port.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ArtifactKind, RawMetrics};

/// Everything the harness needs to run one variant.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub artifact_kind: ArtifactKind,
    pub content: String,
    pub input: Value,
}

/// External harness that executes a variant and measures it.
#[async_trait]
pub trait ExecutionHarness: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the variant and return exit status, latency, memory and the
    /// external quality proxy.
    async fn execute_and_measure(&self, request: ExecutionRequest) -> DomainResult<RawMetrics>;
}
