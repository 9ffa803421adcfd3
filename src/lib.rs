//! Variant Forge - evolutionary artifact optimizer
//!
//! Variant Forge maintains a population of competing implementations
//! ("variants") for each logical artifact, scores them, groups them into
//! niches in embedding space, promotes the fittest to canonical and trims
//! the rest according to a configurable selection pressure. Lessons learned
//! from comparing sibling executions feed back into later runs.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Scoring, clustering, trimming, learning and the optimization loop
//! - **Adapters** (`adapters`): In-memory repository and deterministic synthetic services
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use variant_forge::services::{Optimizer, OptimizerPorts};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let optimizer = Optimizer::init(config, ports)?;
//!     let report = optimizer.optimize("parse_records", "auto", None, "medium").await;
//!     println!("{:?}", report.status);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ArtifactKind, ArtifactVariant, Config, FitnessEvaluation, OptimizationCluster,
    OptimizationGoal, OptimizationReport, OptimizationStrategy, PressureAdjustments,
    PressureLevel, RunStatus, Termination,
};
pub use domain::ports::{
    ClusterRepository, EmbeddingProvider, ExecutionHarness, PressureConfigSource, ToolInvoker,
    VariantGenerator,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Optimizer, OptimizerPorts};
