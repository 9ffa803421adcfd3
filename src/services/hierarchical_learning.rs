//! Hierarchical learning propagator.
//!
//! Child node executions are recorded against their parent. When siblings
//! diverge on the quality/speed trade-off, a [`NodeLearning`] is synthesized
//! naming the child the requested goal favours. Separately, a strategy
//! preference table remembers which optimization strategy produced the best
//! result for a task pattern.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::fitness_evaluator::{rank, FitnessEvaluator};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChildAggregate, LearningConfig, NodeLearning, NodeMetrics, OptimizationGoal,
    OptimizationStrategy, StrategyPreference,
};

#[derive(Debug, Default)]
struct LearningState {
    /// Child executions keyed by parent node id.
    children: HashMap<String, Vec<NodeMetrics>>,
    /// Executions without a parent.
    roots: usize,
    learnings: Vec<NodeLearning>,
    preferences: HashMap<String, StrategyPreference>,
}

/// Shared learning tables. Safe to use from concurrent optimization runs.
pub struct HierarchicalLearning {
    config: LearningConfig,
    evaluator: FitnessEvaluator,
    state: RwLock<LearningState>,
}

/// One step in the strategy resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyLookup {
    /// A preference recorded under exactly this pattern.
    ExactPattern,
    /// The preference whose pattern shares the most keywords.
    KeywordOverlap,
    /// The configured fallback strategy.
    Default(OptimizationStrategy),
}

/// A lookup found nothing for the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupMiss {
    pub lookup: &'static str,
}

impl fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lookup found no strategy", self.lookup)
    }
}

impl StrategyLookup {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyLookup::ExactPattern => "exact_pattern",
            StrategyLookup::KeywordOverlap => "keyword_overlap",
            StrategyLookup::Default(_) => "default",
        }
    }

    fn lookup(
        &self,
        pattern: &str,
        preferences: &HashMap<String, StrategyPreference>,
    ) -> Result<OptimizationStrategy, LookupMiss> {
        let miss = LookupMiss {
            lookup: self.name(),
        };
        match self {
            StrategyLookup::ExactPattern => preferences
                .get(pattern)
                .map(|pref| pref.strategy)
                .ok_or(miss),
            StrategyLookup::KeywordOverlap => {
                let wanted = keywords(pattern);
                preferences
                    .values()
                    .filter_map(|pref| {
                        let shared = keywords(&pref.task_pattern).intersection(&wanted).count();
                        (shared > 0).then_some((shared, pref))
                    })
                    .max_by(|(sa, a), (sb, b)| {
                        sa.cmp(sb)
                            .then_with(|| a.quality.total_cmp(&b.quality))
                            .then_with(|| b.task_pattern.cmp(&a.task_pattern))
                    })
                    .map(|(_, pref)| pref.strategy)
                    .ok_or(miss)
            }
            StrategyLookup::Default(strategy) => Ok(*strategy),
        }
    }
}

fn keywords(pattern: &str) -> BTreeSet<String> {
    pattern
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl HierarchicalLearning {
    pub fn new(config: LearningConfig, evaluator: FitnessEvaluator) -> Self {
        Self {
            config,
            evaluator,
            state: RwLock::new(LearningState::default()),
        }
    }

    /// Record one node execution.
    pub async fn record_execution(&self, metrics: NodeMetrics) -> DomainResult<()> {
        if !(0.0..=1.0).contains(&metrics.quality) {
            return Err(DomainError::ValidationFailed(format!(
                "node {} quality {} outside [0, 1]",
                metrics.node_id, metrics.quality
            )));
        }
        if !metrics.speed_ms.is_finite() || metrics.speed_ms < 0.0 {
            return Err(DomainError::ValidationFailed(format!(
                "node {} has invalid latency {}",
                metrics.node_id, metrics.speed_ms
            )));
        }

        let window = self.config.history_window.max(1);
        let mut state = self.state.write().await;
        match metrics.parent_node_id.clone() {
            Some(parent) => {
                let history = state.children.entry(parent).or_default();
                history.push(metrics);
                if history.len() > window {
                    let excess = history.len() - window;
                    history.drain(..excess);
                }
            }
            None => state.roots += 1,
        }
        Ok(())
    }

    /// Drop every execution of `child_ids` under `parent_node_id`, along with
    /// the learnings that recommend one of them.
    ///
    /// Called once a child leaves its parent's population, so an archived
    /// variant is never handed out as a recommendation.
    pub async fn forget_children(&self, parent_node_id: &str, child_ids: &[String]) {
        if child_ids.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        if let Some(history) = state.children.get_mut(parent_node_id) {
            history.retain(|m| !child_ids.contains(&m.node_id));
            if history.is_empty() {
                state.children.remove(parent_node_id);
            }
        }
        let before = state.learnings.len();
        state
            .learnings
            .retain(|l| !(l.node_id == parent_node_id && child_ids.contains(&l.recommendation)));
        debug!(
            parent = parent_node_id,
            children = child_ids.len(),
            learnings_dropped = before - state.learnings.len(),
            "forgot archived children"
        );
    }

    /// Per-child aggregates under `parent_node_id`, ordered by child id.
    pub async fn child_aggregates(&self, parent_node_id: &str) -> Vec<ChildAggregate> {
        let state = self.state.read().await;
        let Some(executions) = state.children.get(parent_node_id) else {
            return Vec::new();
        };

        let mut grouped: BTreeMap<&str, Vec<&NodeMetrics>> = BTreeMap::new();
        for m in executions {
            grouped.entry(m.node_id.as_str()).or_default().push(m);
        }

        grouped
            .into_iter()
            .map(|(node_id, runs)| {
                let n = runs.len() as f64;
                ChildAggregate {
                    node_id: node_id.to_string(),
                    samples: runs.len(),
                    mean_quality: runs.iter().map(|m| m.quality).sum::<f64>() / n,
                    mean_speed_ms: runs.iter().map(|m| m.speed_ms).sum::<f64>() / n,
                    success_rate: runs.iter().filter(|m| m.success).count() as f64 / n,
                }
            })
            .collect()
    }

    /// Derive a lesson from the children of `parent_node_id`.
    ///
    /// Returns `Ok(None)` when there are too few children, when the children
    /// are statistically tied, or when one child is both the most accurate
    /// and the fastest.
    pub async fn learn_from_children(
        &self,
        parent_node_id: &str,
        goal: OptimizationGoal,
    ) -> DomainResult<Option<NodeLearning>> {
        let children = self.child_aggregates(parent_node_id).await;
        if children.len() < self.config.min_children.max(2) {
            debug!(parent = parent_node_id, children = children.len(), "too few children to learn from");
            return Ok(None);
        }

        if self.is_tied(&children) {
            debug!(parent = parent_node_id, "children statistically tied");
            return Ok(None);
        }

        let most_accurate = pick(&children, by_quality);
        let fastest = pick(&children, by_speed);
        if most_accurate.node_id == fastest.node_id {
            debug!(parent = parent_node_id, child = %fastest.node_id, "no quality/speed trade-off");
            return Ok(None);
        }

        let recommended = match goal {
            OptimizationGoal::Quality => most_accurate,
            OptimizationGoal::Speed => fastest,
            OptimizationGoal::Balanced => {
                let mut scored: Vec<_> = children
                    .iter()
                    .map(|c| {
                        let eval = self.evaluator.score_aggregate(
                            c.mean_quality,
                            c.mean_speed_ms,
                            c.success_rate,
                        );
                        (c, eval)
                    })
                    .collect();
                scored.sort_by(|(ca, a), (cb, b)| {
                    rank(a, b, OptimizationGoal::Balanced).then_with(|| ca.node_id.cmp(&cb.node_id))
                });
                scored[0].0
            }
        };

        let quality_gap = most_accurate.mean_quality - fastest.mean_quality;
        let speed_gap = relative_gap(fastest.mean_speed_ms, most_accurate.mean_speed_ms);
        let support = recommended.samples as f64 / (recommended.samples as f64 + 1.0);
        let separation = (quality_gap + speed_gap).clamp(0.0, 1.0);
        let confidence = (support * (0.5 + 0.5 * separation)).clamp(0.0, 1.0);

        let learning = NodeLearning {
            node_id: parent_node_id.to_string(),
            context_signature: format!("{parent_node_id}:{goal}"),
            goal,
            lesson: format!(
                "{} reached quality {:.2} in {:.0}ms while {} ran in {:.0}ms at quality {:.2}; {} favours {}",
                most_accurate.node_id,
                most_accurate.mean_quality,
                most_accurate.mean_speed_ms,
                fastest.node_id,
                fastest.mean_speed_ms,
                fastest.mean_quality,
                goal,
                recommended.node_id
            ),
            quality_achieved: recommended.mean_quality,
            speed_achieved: recommended.mean_speed_ms,
            recommendation: recommended.node_id.clone(),
            confidence,
            usage_count: 0,
            success_rate: recommended.success_rate,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        let stored = match state
            .learnings
            .iter_mut()
            .find(|l| l.context_signature == learning.context_signature)
        {
            Some(existing) => {
                let usage_count = existing.usage_count;
                *existing = NodeLearning {
                    usage_count,
                    ..learning
                };
                existing.clone()
            }
            None => {
                state.learnings.push(learning.clone());
                learning
            }
        };

        info!(
            parent = parent_node_id,
            goal = %goal,
            recommendation = %stored.recommendation,
            confidence = stored.confidence,
            "learned from children"
        );
        Ok(Some(stored))
    }

    /// Learnings recorded for a node or context signature.
    pub async fn learnings_for(&self, context: &str) -> Vec<NodeLearning> {
        let state = self.state.read().await;
        state
            .learnings
            .iter()
            .filter(|l| l.node_id == context || l.context_signature == context)
            .cloned()
            .collect()
    }

    /// Highest-confidence learning for `context`.
    pub async fn best_learning(&self, context: &str) -> Option<NodeLearning> {
        self.learnings_for(context)
            .await
            .into_iter()
            .max_by(|a, b| {
                a.confidence
                    .total_cmp(&b.confidence)
                    .then_with(|| b.context_signature.cmp(&a.context_signature))
            })
    }

    /// Count one consumption of the learning under `context_signature`.
    pub async fn mark_used(&self, context_signature: &str) {
        let mut state = self.state.write().await;
        if let Some(learning) = state
            .learnings
            .iter_mut()
            .find(|l| l.context_signature == context_signature)
        {
            learning.usage_count += 1;
        }
    }

    /// Record the outcome of `strategy` on `task_pattern`.
    ///
    /// The stored preference only changes when the new observation beats it.
    pub async fn record_strategy_preference(
        &self,
        task_pattern: &str,
        strategy: OptimizationStrategy,
        quality: f64,
        speed_ms: f64,
    ) {
        let mut state = self.state.write().await;
        let now = Utc::now();
        match state.preferences.get_mut(task_pattern) {
            Some(pref) => {
                pref.observations += 1;
                if pref.is_beaten_by(quality, speed_ms) {
                    pref.strategy = strategy;
                    pref.quality = quality;
                    pref.speed_ms = speed_ms;
                    pref.updated_at = now;
                }
            }
            None => {
                state.preferences.insert(
                    task_pattern.to_string(),
                    StrategyPreference {
                        task_pattern: task_pattern.to_string(),
                        strategy,
                        quality,
                        speed_ms,
                        observations: 1,
                        updated_at: now,
                    },
                );
            }
        }
    }

    pub async fn get_best_strategy(&self, task_pattern: &str) -> Option<StrategyPreference> {
        self.state.read().await.preferences.get(task_pattern).cloned()
    }

    /// Resolve a strategy for `pattern` through the fallback chain.
    pub async fn resolve_strategy(&self, pattern: &str) -> OptimizationStrategy {
        let chain = [
            StrategyLookup::ExactPattern,
            StrategyLookup::KeywordOverlap,
            StrategyLookup::Default(self.config.fallback_strategy),
        ];
        let state = self.state.read().await;

        for step in chain {
            match step.lookup(pattern, &state.preferences) {
                Ok(strategy) => {
                    debug!(pattern, lookup = step.name(), strategy = %strategy, "strategy resolved");
                    return strategy;
                }
                Err(miss) => debug!(pattern, "{miss}"),
            }
        }
        self.config.fallback_strategy
    }

    /// Number of root executions recorded.
    pub async fn root_executions(&self) -> usize {
        self.state.read().await.roots
    }

    fn is_tied(&self, children: &[ChildAggregate]) -> bool {
        let (q_min, q_max) = spread(children.iter().map(|c| c.mean_quality));
        let (s_min, s_max) = spread(children.iter().map(|c| c.mean_speed_ms));
        q_max - q_min < self.config.quality_epsilon
            && relative_gap(s_min, s_max) < self.config.speed_epsilon
    }
}

fn by_quality(a: &ChildAggregate, b: &ChildAggregate) -> Ordering {
    b.mean_quality
        .total_cmp(&a.mean_quality)
        .then_with(|| a.mean_speed_ms.total_cmp(&b.mean_speed_ms))
        .then_with(|| a.node_id.cmp(&b.node_id))
}

fn by_speed(a: &ChildAggregate, b: &ChildAggregate) -> Ordering {
    a.mean_speed_ms
        .total_cmp(&b.mean_speed_ms)
        .then_with(|| b.mean_quality.total_cmp(&a.mean_quality))
        .then_with(|| a.node_id.cmp(&b.node_id))
}

fn pick(
    children: &[ChildAggregate],
    order: fn(&ChildAggregate, &ChildAggregate) -> Ordering,
) -> &ChildAggregate {
    let mut best = &children[0];
    for child in &children[1..] {
        if order(child, best) == Ordering::Less {
            best = child;
        }
    }
    best
}

fn spread(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// `(slow - fast) / slow`, zero when both are instant.
fn relative_gap(fast: f64, slow: f64) -> f64 {
    if slow <= f64::EPSILON {
        0.0
    } else {
        ((slow - fast) / slow).max(0.0)
    }
}
