//! Domain errors for the variant optimizer.

use thiserror::Error;

/// Domain-level errors that can occur while optimizing a variant population.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A requested pressure level, strategy or config entry does not exist.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation that needs a canonical variant ran on an empty cluster.
    #[error("Cluster {0} has no canonical variant")]
    EmptyCluster(String),

    #[error("External service '{service}' failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("External service '{service}' timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    /// Internal state corruption. Never repaired silently.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Variant belongs to artifact '{found}', cluster holds '{expected}'")]
    ArtifactMismatch { expected: String, found: String },

    #[error("Variant {0} is archived and cannot be re-admitted")]
    VariantArchived(String),

    #[error("Generated variant violates constraints: {0}")]
    ConstraintViolation(String),

    #[error("Optimizer has been shut down")]
    ShutDown,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Shorthand for an external service failure.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is worth retrying.
    ///
    /// Only boundary calls to external services are transient; everything
    /// the core decides itself is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExternalService { .. } | Self::Timeout { .. })
    }

    /// Whether the failure must abort the whole optimization run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Configuration(_))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DomainError::external("embed", "connection reset").is_transient());
        assert!(DomainError::Timeout {
            service: "generate".to_string(),
            timeout_ms: 10
        }
        .is_transient());
        assert!(!DomainError::Configuration("missing level".to_string()).is_transient());
        assert!(!DomainError::InvariantViolation("two canonicals".to_string()).is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DomainError::InvariantViolation("x".to_string()).is_fatal());
        assert!(DomainError::Configuration("x".to_string()).is_fatal());
        assert!(!DomainError::EmptyCluster("c".to_string()).is_fatal());
        assert!(!DomainError::external("execute", "boom").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = DomainError::ArtifactMismatch {
            expected: "parse_csv".to_string(),
            found: "parse_json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Variant belongs to artifact 'parse_json', cluster holds 'parse_csv'"
        );
    }
}
