//! Hierarchical learning records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fitness::OptimizationGoal;
use super::optimization::OptimizationStrategy;

/// One execution of a node in the call hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_id: String,
    /// Parent node, `None` for a root.
    #[serde(default)]
    pub parent_node_id: Option<String>,
    /// Quality in [0, 1].
    pub quality: f64,
    /// Latency in milliseconds; lower is faster.
    pub speed_ms: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl NodeMetrics {
    pub fn new(node_id: impl Into<String>, quality: f64, speed_ms: f64, success: bool) -> Self {
        Self {
            node_id: node_id.into(),
            parent_node_id: None,
            quality,
            speed_ms,
            success,
            timestamp: Utc::now(),
        }
    }

    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent_node_id = Some(parent.into());
        self
    }
}

/// Aggregated view of one child node's executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildAggregate {
    pub node_id: String,
    pub samples: usize,
    pub mean_quality: f64,
    pub mean_speed_ms: f64,
    pub success_rate: f64,
}

/// Insight derived from a quality/speed trade-off between sibling nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLearning {
    /// Parent node the lesson was learned under.
    pub node_id: String,
    pub context_signature: String,
    pub goal: OptimizationGoal,
    pub lesson: String,
    pub quality_achieved: f64,
    pub speed_achieved: f64,
    /// Child node favoured under `goal`.
    pub recommendation: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub usage_count: u64,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Best known strategy for a task pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPreference {
    pub task_pattern: String,
    pub strategy: OptimizationStrategy,
    pub quality: f64,
    pub speed_ms: f64,
    /// How many recorded runs the pattern has seen.
    pub observations: u64,
    pub updated_at: DateTime<Utc>,
}

impl StrategyPreference {
    /// Whether a new observation should replace this preference.
    ///
    /// Highest quality wins; equal quality falls back to lower latency.
    pub fn is_beaten_by(&self, quality: f64, speed_ms: f64) -> bool {
        quality > self.quality || (quality == self.quality && speed_ms < self.speed_ms)
    }
}
