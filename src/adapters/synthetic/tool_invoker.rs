use async_trait::async_trait;
use serde_json::json;

use super::{fingerprint, unit};
use crate::domain::errors::DomainResult;
use crate::domain::models::{RawMetrics, ToolRequest, ToolResponse};
use crate::domain::ports::ToolInvoker;

/// Pretends to run a payload and derives the measurements from its hash.
///
/// Roughly one payload in `failure_modulus` fails with a non-zero exit code.
pub struct SyntheticToolInvoker {
    failure_modulus: u64,
}

impl SyntheticToolInvoker {
    pub fn new(failure_modulus: u64) -> Self {
        Self { failure_modulus }
    }

    /// Invoker whose payloads never fail.
    pub fn reliable() -> Self {
        Self { failure_modulus: 0 }
    }

    fn measure(&self, payload: &str) -> RawMetrics {
        let hash = fingerprint(payload.as_bytes());
        let latency_ms = 20.0 + unit(hash >> 8) * 200.0;

        if self.failure_modulus > 0 && (hash >> 24) % self.failure_modulus == 0 {
            return RawMetrics::failure("synthetic run exited abnormally", latency_ms);
        }

        let mut metrics = RawMetrics::success(0.3 + unit(hash) * 0.7, latency_ms);
        metrics.memory_mb = 8.0 + ((hash >> 32) % 120) as f64;
        metrics.test_coverage = Some(unit(hash >> 40));
        metrics
    }
}

impl Default for SyntheticToolInvoker {
    fn default() -> Self {
        Self::new(13)
    }
}

#[async_trait]
impl ToolInvoker for SyntheticToolInvoker {
    async fn invoke(&self, request: ToolRequest) -> DomainResult<ToolResponse> {
        let metrics = self.measure(&request.payload);
        Ok(ToolResponse {
            output: json!({
                "kind": request.kind.as_str(),
                "input": request.input,
                "succeeded": metrics.succeeded(),
            }),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ToolKind;
    use serde_json::Value;

    fn request(payload: &str) -> ToolRequest {
        ToolRequest {
            kind: ToolKind::Executable,
            payload: payload.to_string(),
            input: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_measurements_are_deterministic_and_bounded() {
        let invoker = SyntheticToolInvoker::reliable();
        for i in 0..50 {
            let payload = format!("fn candidate_{i}() {{}}");
            let a = invoker.invoke(request(&payload)).await.unwrap();
            let b = invoker.invoke(request(&payload)).await.unwrap();
            assert_eq!(a, b);

            let metrics = a.metrics;
            assert!(metrics.succeeded());
            let quality = metrics.quality.unwrap();
            assert!((0.3..=1.0).contains(&quality));
            assert!((20.0..=220.0).contains(&metrics.latency_ms));
        }
    }

    #[tokio::test]
    async fn test_failure_modulus_one_always_fails() {
        let invoker = SyntheticToolInvoker::new(1);
        let response = invoker.invoke(request("anything")).await.unwrap();
        assert!(!response.metrics.succeeded());
        assert_eq!(response.output["succeeded"], false);
    }
}
