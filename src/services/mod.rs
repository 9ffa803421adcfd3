//! Service layer: the optimizer core.
//!
//! Everything here is pure computation over domain models except the
//! optimization loop and the optimizer facade, which drive the ports.

pub mod clustering;
pub mod fitness_evaluator;
pub mod hierarchical_learning;
pub mod optimization_loop;
pub mod optimizer;
pub mod pressure_manager;
pub mod retry;
pub mod tool_dispatch;
pub mod trimming;

pub use clustering::{cosine_distance, rank_variants, Admission, ClusteringEngine};
pub use fitness_evaluator::FitnessEvaluator;
pub use hierarchical_learning::{HierarchicalLearning, LookupMiss, StrategyLookup};
pub use optimization_loop::{LoopOutcome, LoopRequest, LoopServices, OptimizationLoop};
pub use optimizer::{OptimizeRequest, Optimizer, OptimizerPorts, AUTO_STRATEGY};
pub use pressure_manager::PressureManager;
pub use retry::RetryPolicy;
pub use tool_dispatch::{ToolDispatcher, ToolExecutionHarness};
pub use trimming::{ArchivalDecision, ArchivalReason, TrimOutcome, TrimmingPolicy};
