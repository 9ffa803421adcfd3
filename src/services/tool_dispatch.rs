//! Tool dispatch.
//!
//! Variants are executed through one of a closed set of tool kinds. The
//! dispatcher holds at most one invoker per kind and routes by kind.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RawMetrics, ToolKind, ToolRequest, ToolResponse};
use crate::domain::ports::{ExecutionHarness, ExecutionRequest, ToolInvoker};

#[derive(Default, Clone)]
pub struct ToolDispatcher {
    llm: Option<Arc<dyn ToolInvoker>>,
    executable: Option<Arc<dyn ToolInvoker>>,
    openapi: Option<Arc<dyn ToolInvoker>>,
    workflow: Option<Arc<dyn ToolInvoker>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `invoker` for `kind`, replacing any previous one.
    #[must_use]
    pub fn with_invoker(mut self, kind: ToolKind, invoker: Arc<dyn ToolInvoker>) -> Self {
        *self.slot_mut(kind) = Some(invoker);
        self
    }

    pub fn supports(&self, kind: ToolKind) -> bool {
        self.slot(kind).is_some()
    }

    fn slot(&self, kind: ToolKind) -> &Option<Arc<dyn ToolInvoker>> {
        match kind {
            ToolKind::Llm => &self.llm,
            ToolKind::Executable => &self.executable,
            ToolKind::OpenApi => &self.openapi,
            ToolKind::Workflow => &self.workflow,
        }
    }

    fn slot_mut(&mut self, kind: ToolKind) -> &mut Option<Arc<dyn ToolInvoker>> {
        match kind {
            ToolKind::Llm => &mut self.llm,
            ToolKind::Executable => &mut self.executable,
            ToolKind::OpenApi => &mut self.openapi,
            ToolKind::Workflow => &mut self.workflow,
        }
    }

    /// Route `request` to the invoker registered for its kind.
    pub async fn dispatch(&self, request: ToolRequest) -> DomainResult<ToolResponse> {
        let kind = request.kind;
        let invoker = self.slot(kind).as_ref().ok_or_else(|| {
            DomainError::Configuration(format!(
                "no invoker registered for tool kind '{}'",
                kind.as_str()
            ))
        })?;
        debug!(kind = kind.as_str(), "dispatching tool request");
        invoker.invoke(request).await
    }
}

/// Execution harness that runs variants through a [`ToolDispatcher`].
pub struct ToolExecutionHarness {
    dispatcher: ToolDispatcher,
}

impl ToolExecutionHarness {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl ExecutionHarness for ToolExecutionHarness {
    fn name(&self) -> &'static str {
        "tool_dispatch"
    }

    async fn execute_and_measure(&self, request: ExecutionRequest) -> DomainResult<RawMetrics> {
        let response = self
            .dispatcher
            .dispatch(ToolRequest {
                kind: ToolKind::for_artifact(request.artifact_kind),
                payload: request.content,
                input: request.input,
            })
            .await?;
        Ok(response.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ArtifactKind;
    use serde_json::{json, Value};

    struct EchoInvoker {
        kind: ToolKind,
    }

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, request: ToolRequest) -> DomainResult<ToolResponse> {
            assert_eq!(request.kind, self.kind);
            Ok(ToolResponse {
                output: json!({ "kind": self.kind.as_str(), "payload": request.payload }),
                metrics: RawMetrics::success(0.75, 12.0),
            })
        }
    }

    fn echo(kind: ToolKind) -> Arc<dyn ToolInvoker> {
        Arc::new(EchoInvoker { kind })
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_kind() {
        let dispatcher = ToolDispatcher::new()
            .with_invoker(ToolKind::Llm, echo(ToolKind::Llm))
            .with_invoker(ToolKind::OpenApi, echo(ToolKind::OpenApi));

        let response = dispatcher
            .dispatch(ToolRequest {
                kind: ToolKind::OpenApi,
                payload: "GET /status".into(),
                input: Value::Null,
            })
            .await
            .unwrap();
        assert_eq!(response.output["kind"], "openapi");
        assert!(dispatcher.supports(ToolKind::Llm));
        assert!(!dispatcher.supports(ToolKind::Workflow));
    }

    #[tokio::test]
    async fn test_missing_invoker_is_configuration_error() {
        let dispatcher = ToolDispatcher::new();
        let err = dispatcher
            .dispatch(ToolRequest {
                kind: ToolKind::Executable,
                payload: "fn main() {}".into(),
                input: Value::Null,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("executable")));
    }

    #[tokio::test]
    async fn test_harness_maps_artifact_kind() {
        let dispatcher = ToolDispatcher::new().with_invoker(ToolKind::Llm, echo(ToolKind::Llm));
        let harness = ToolExecutionHarness::new(dispatcher);

        let metrics = harness
            .execute_and_measure(ExecutionRequest {
                artifact_kind: ArtifactKind::Prompt,
                content: "Summarize the input".into(),
                input: json!({ "text": "hello" }),
            })
            .await
            .unwrap();
        assert_eq!(metrics.quality, Some(0.75));

        let err = harness
            .execute_and_measure(ExecutionRequest {
                artifact_kind: ArtifactKind::Workflow,
                content: "steps: []".into(),
                input: Value::Null,
            })
            .await;
        assert!(err.is_err());
    }
}
