pub mod cluster;
pub mod config;
pub mod fitness;
pub mod learning;
pub mod optimization;
pub mod pressure;
pub mod tool;
pub mod variant;

pub use cluster::{ClusterStatistics, OptimizationCluster, PromotionEvent};
pub use config::{
    Config, FitnessConfig, LearningConfig, LoggingConfig, OptimizerConfig, RetryConfig,
};
pub use fitness::{
    rankable_latency, rankable_score, FitnessEvaluation, OptimizationGoal, RawMetrics, Verdict,
};
pub use learning::{ChildAggregate, NodeLearning, NodeMetrics, StrategyPreference};
pub use optimization::{
    GeneratedVariant, GenerationConstraints, GenerationMode, IterationResult,
    OptimizationReport, OptimizationStrategy, RunStatus, Termination, INCREMENTAL_MAX_RISK,
};
pub use pressure::{PressureAdjustments, PressureLevel};
pub use tool::{ToolKind, ToolRequest, ToolResponse};
pub use variant::{
    ArtifactKind, ArtifactVariant, DeltaType, PerformanceMetrics, SemanticDelta, VariantStatus,
};
