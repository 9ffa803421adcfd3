//! Tool invoker port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ToolRequest, ToolResponse};

/// One backend capable of invoking tools of a single kind.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, request: ToolRequest) -> DomainResult<ToolResponse>;
}
