//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces external collaborators implement:
//! - VariantGenerator: code/prompt generation service
//! - EmbeddingProvider: semantic embedding service
//! - ExecutionHarness: runs a variant and measures it
//! - ClusterRepository: persistence of the variant population
//! - PressureConfigSource: per-level pressure table
//! - ToolInvoker: one backend per tool kind
//!
//! The optimizer core never performs blocking I/O itself; every suspension
//! point sits behind one of these traits.
pub mod cluster_repository;
pub mod embedding;
pub mod execution;
pub mod generator;
pub mod pressure_config;
pub mod tool;

pub use cluster_repository::ClusterRepository;
pub use embedding::EmbeddingProvider;
pub use execution::{ExecutionHarness, ExecutionRequest};
pub use generator::VariantGenerator;
pub use pressure_config::PressureConfigSource;
pub use tool::ToolInvoker;
