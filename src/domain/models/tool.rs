//! Tool invocation models used by the execution harness.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fitness::RawMetrics;
use super::variant::ArtifactKind;

/// Closed set of tool kinds a variant can be executed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Llm,
    Executable,
    OpenApi,
    Workflow,
}

impl ToolKind {
    /// Tool kind that runs an artifact of the given kind.
    pub fn for_artifact(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Function => ToolKind::Executable,
            ArtifactKind::Prompt => ToolKind::Llm,
            ArtifactKind::Workflow | ArtifactKind::SubWorkflow => ToolKind::Workflow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Llm => "llm",
            ToolKind::Executable => "executable",
            ToolKind::OpenApi => "openapi",
            ToolKind::Workflow => "workflow",
        }
    }
}

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub kind: ToolKind,
    /// Variant content: program source, prompt text, workflow definition
    /// or operation spec, depending on `kind`.
    pub payload: String,
    pub input: Value,
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub output: Value,
    pub metrics: RawMetrics,
}
