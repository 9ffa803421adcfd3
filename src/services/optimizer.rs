//! Optimizer context.
//!
//! [`Optimizer`] owns every piece of shared state an optimization run needs:
//! the validated pressure table, the learning tables, the repository handle
//! and one exclusivity lock per cluster. It is created with
//! [`Optimizer::init`] and stopped with [`Optimizer::shutdown`]; there is no
//! process-global state.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::clustering::ClusteringEngine;
use super::fitness_evaluator::FitnessEvaluator;
use super::hierarchical_learning::HierarchicalLearning;
use super::optimization_loop::{LoopOutcome, LoopRequest, LoopServices, OptimizationLoop};
use super::pressure_manager::PressureManager;
use super::retry::RetryPolicy;
use super::trimming::TrimmingPolicy;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArtifactKind, ArtifactVariant, Config, NodeLearning, NodeMetrics, OptimizationCluster,
    OptimizationGoal, OptimizationReport, OptimizationStrategy, PerformanceMetrics, PressureLevel,
    StrategyPreference, Termination,
};
use crate::domain::ports::{
    ClusterRepository, EmbeddingProvider, ExecutionHarness, ExecutionRequest, PressureConfigSource,
    VariantGenerator,
};

/// Strategy name that defers the choice to learned preferences.
pub const AUTO_STRATEGY: &str = "auto";

/// External collaborators handed to [`Optimizer::init`].
#[derive(Clone)]
pub struct OptimizerPorts {
    pub generator: Arc<dyn VariantGenerator>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub harness: Arc<dyn ExecutionHarness>,
    pub repository: Arc<dyn ClusterRepository>,
    pub pressure_source: Arc<dyn PressureConfigSource>,
}

/// One entry of a batch run.
#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    pub cluster_id: String,
    /// Strategy name, or `"auto"`.
    pub strategy: String,
    /// Falls back to the configured default when `None`.
    pub max_iterations: Option<usize>,
    pub pressure_level: String,
}

pub struct Optimizer {
    config: Config,
    pressure: PressureManager,
    evaluator: FitnessEvaluator,
    retry: RetryPolicy,
    learning: Arc<HierarchicalLearning>,
    services: LoopServices,
    optimization_loop: OptimizationLoop,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    running: AtomicBool,
}

impl Optimizer {
    /// Validate configuration and wire the context together.
    ///
    /// Fails with a configuration error when the pressure table is invalid.
    pub fn init(config: Config, ports: OptimizerPorts) -> DomainResult<Self> {
        let pressure = PressureManager::from_source(ports.pressure_source.as_ref())?;
        let evaluator = FitnessEvaluator::new(config.fitness.clone());
        let retry = RetryPolicy::from_config(&config.retry, config.optimizer.service_timeout_ms);
        let learning = Arc::new(HierarchicalLearning::new(
            config.learning.clone(),
            evaluator.clone(),
        ));
        let services = LoopServices {
            generator: ports.generator,
            embedder: ports.embedder,
            harness: ports.harness,
            repository: ports.repository,
        };
        let optimization_loop = OptimizationLoop::new(
            services.clone(),
            evaluator.clone(),
            retry.clone(),
            Arc::clone(&learning),
            config.optimizer.plateau_window,
        );

        info!(
            generator = services.generator.name(),
            embedder = services.embedder.name(),
            harness = services.harness.name(),
            pressure_levels = pressure.levels().count(),
            "optimizer initialized"
        );

        Ok(Self {
            config,
            pressure,
            evaluator,
            retry,
            learning,
            services,
            optimization_loop,
            locks: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
        })
    }

    /// Stop accepting work and wait for in-flight runs to commit.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let locks: Vec<Arc<Mutex<()>>> = self.locks.lock().await.values().cloned().collect();
        for lock in locks {
            let _drained = lock.lock().await;
        }
        info!("optimizer shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pressure(&self) -> &PressureManager {
        &self.pressure
    }

    fn ensure_running(&self) -> DomainResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(DomainError::ShutDown)
        }
    }

    async fn cluster_lock(&self, cluster_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(cluster_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Lock for a cluster the repository already holds.
    ///
    /// Unknown ids fail with `ClusterNotFound` without allocating a lock.
    async fn existing_cluster_lock(&self, cluster_id: &str) -> DomainResult<Arc<Mutex<()>>> {
        if let Some(lock) = self.locks.lock().await.get(cluster_id) {
            return Ok(Arc::clone(lock));
        }
        let repository = &self.services.repository;
        let known = self
            .retry
            .execute("repository", || repository.get(cluster_id))
            .await?
            .is_some();
        if !known {
            return Err(DomainError::ClusterNotFound(cluster_id.to_string()));
        }
        Ok(self.cluster_lock(cluster_id).await)
    }

    /// Number of clusters holding an exclusivity lock.
    pub async fn tracked_clusters(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Admit a variant into `cluster_id`, creating the cluster on first use.
    ///
    /// Unscored variants are embedded and measured first, so the first
    /// registration of an artifact becomes its canonical.
    #[instrument(skip(self, variant), fields(variant_id = %variant.variant_id))]
    pub async fn register_variant(
        &self,
        cluster_id: &str,
        artifact_kind: ArtifactKind,
        variant: ArtifactVariant,
        pressure_level: PressureLevel,
    ) -> DomainResult<OptimizationCluster> {
        self.ensure_running()?;
        let adjustments = self.pressure.get_adjustments(pressure_level)?;

        let lock = self.cluster_lock(cluster_id).await;
        let _guard = lock.lock().await;

        let repository = &self.services.repository;
        let cluster = self
            .retry
            .execute("repository", || repository.get(cluster_id))
            .await?
            .unwrap_or_else(|| {
                OptimizationCluster::new(cluster_id, variant.artifact_id.clone())
                    .with_kind(artifact_kind)
            });

        let variant = self.prepare(&cluster, variant).await?;
        let admission = ClusteringEngine::new().admit(&cluster, variant, &adjustments)?;
        admission.cluster.validate()?;

        self.retry
            .execute("repository", || repository.save(&admission.cluster))
            .await?;
        info!(
            cluster_id,
            size = admission.cluster.size(),
            promoted = admission.promoted,
            "variant registered"
        );
        Ok(admission.cluster)
    }

    async fn prepare(
        &self,
        cluster: &OptimizationCluster,
        mut variant: ArtifactVariant,
    ) -> DomainResult<ArtifactVariant> {
        if variant.embedding.is_empty() {
            let embedder = &self.services.embedder;
            variant.embedding = self
                .retry
                .execute(embedder.name(), || embedder.embed(&variant.content))
                .await?;
        }

        if variant.fitness.is_none() {
            let harness = &self.services.harness;
            let request = ExecutionRequest {
                artifact_kind: cluster.artifact_kind,
                content: variant.content.clone(),
                input: Value::Null,
            };
            let raw = self
                .retry
                .execute(harness.name(), || harness.execute_and_measure(request.clone()))
                .await?;
            variant = variant
                .with_performance(PerformanceMetrics {
                    latency_ms: raw.latency_ms,
                    memory_mb: raw.memory_mb,
                    success_rate: if raw.succeeded() { 1.0 } else { 0.0 },
                    test_coverage: raw.test_coverage.unwrap_or(0.0),
                })
                .with_fitness(self.evaluator.score(&raw));
        }
        Ok(variant)
    }

    /// Run one optimization pass over `cluster_id`.
    ///
    /// Always returns a report. Configuration problems and missing clusters
    /// produce a failed report with a reason instead of an error.
    #[instrument(skip(self))]
    pub async fn optimize(
        &self,
        cluster_id: &str,
        strategy: &str,
        max_iterations: Option<usize>,
        pressure_level: &str,
    ) -> OptimizationReport {
        let started_at = chrono::Utc::now();
        match self
            .try_optimize(cluster_id, strategy, max_iterations, pressure_level)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                warn!(cluster_id, error = %err, "optimization could not run");
                let termination = match &err {
                    DomainError::InvariantViolation(_) => Termination::InvariantViolation,
                    _ => Termination::Configuration,
                };
                let mut report = OptimizationReport::failed(cluster_id, termination, err.to_string());
                report.started_at = started_at;
                report
            }
        }
    }

    async fn try_optimize(
        &self,
        cluster_id: &str,
        strategy: &str,
        max_iterations: Option<usize>,
        pressure_level: &str,
    ) -> DomainResult<OptimizationReport> {
        self.ensure_running()?;
        let started_at = chrono::Utc::now();
        let level = PressureLevel::from_str(pressure_level)?;
        let adjustments = self.pressure.get_adjustments(level)?;
        let explicit_strategy = if strategy.trim().eq_ignore_ascii_case(AUTO_STRATEGY) {
            None
        } else {
            Some(OptimizationStrategy::from_str(strategy)?)
        };

        let lock = self.existing_cluster_lock(cluster_id).await?;
        let _guard = lock.lock().await;

        let repository = &self.services.repository;
        let cluster = self
            .retry
            .execute("repository", || repository.get(cluster_id))
            .await?
            .ok_or_else(|| DomainError::ClusterNotFound(cluster_id.to_string()))?;
        cluster.validate()?;

        let strategy = match explicit_strategy {
            Some(strategy) => strategy,
            None => self.learning.resolve_strategy(&cluster.artifact_id).await,
        };
        let request = LoopRequest {
            strategy,
            pressure_level: level,
            adjustments,
            max_iterations: max_iterations.unwrap_or(self.config.optimizer.default_max_iterations),
            input: Value::Null,
        };

        let promotions_before = cluster.promotions.len();
        let outcome = self.optimization_loop.run(cluster, &request).await;
        let status = outcome.status();
        let learned_patterns = self.surface_learnings(&outcome).await;

        if let Some(canonical) = outcome.cluster.canonical_variant.as_ref() {
            if let Some(fitness) = canonical.fitness.as_ref() {
                if outcome.iterations.iter().any(|i| !i.is_failed()) {
                    self.learning
                        .record_strategy_preference(
                            &outcome.cluster.artifact_id,
                            strategy,
                            fitness.quality_score,
                            fitness.latency_ms,
                        )
                        .await;
                }
            }
        }

        info!(
            cluster_id,
            status = ?status,
            termination = ?outcome.termination,
            iterations = outcome.iterations.len(),
            "optimization finished"
        );

        let LoopOutcome {
            cluster,
            iterations,
            termination,
            reason,
            ..
        } = outcome;

        Ok(OptimizationReport {
            cluster_id: cluster_id.to_string(),
            strategy: Some(strategy),
            pressure_level: Some(level),
            status,
            termination,
            reason,
            iterations,
            promotions: cluster.promotions.iter().skip(promotions_before).cloned().collect(),
            final_canonical: cluster.canonical_variant.clone(),
            statistics: cluster.statistics(),
            learned_patterns,
            started_at,
            finished_at: chrono::Utc::now(),
        })
    }

    /// Learnings consulted during the run plus any lesson the run's own
    /// variants now support.
    async fn surface_learnings(&self, outcome: &LoopOutcome) -> Vec<NodeLearning> {
        let mut patterns = outcome.learnings_used.clone();
        match self
            .learning
            .learn_from_children(&outcome.cluster.artifact_id, OptimizationGoal::Balanced)
            .await
        {
            Ok(Some(learning)) => {
                patterns.retain(|l| l.context_signature != learning.context_signature);
                patterns.push(learning);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "learning from run failed"),
        }
        patterns
    }

    /// Optimize several clusters concurrently.
    ///
    /// Requests for the same cluster are serialized by its lock.
    pub async fn optimize_many(&self, requests: &[OptimizeRequest]) -> Vec<OptimizationReport> {
        join_all(requests.iter().map(|r| {
            self.optimize(
                &r.cluster_id,
                &r.strategy,
                r.max_iterations,
                &r.pressure_level,
            )
        }))
        .await
    }

    /// Read-only snapshot of a cluster.
    pub async fn get_cluster_state(&self, cluster_id: &str) -> DomainResult<OptimizationCluster> {
        let repository = &self.services.repository;
        self.retry
            .execute("repository", || repository.get(cluster_id))
            .await?
            .ok_or_else(|| DomainError::ClusterNotFound(cluster_id.to_string()))
    }

    /// Archive one alternate by id. Archiving twice is a no-op.
    pub async fn archive_variant(
        &self,
        cluster_id: &str,
        variant_id: &str,
    ) -> DomainResult<OptimizationCluster> {
        self.ensure_running()?;
        let lock = self.existing_cluster_lock(cluster_id).await?;
        let _guard = lock.lock().await;

        let cluster = self.get_cluster_state(cluster_id).await?;
        let (next, archived) = TrimmingPolicy::new().archive(&cluster, variant_id)?;
        if let Some(variant) = archived {
            let repository = &self.services.repository;
            let records = [variant];
            self.retry
                .execute("repository", || repository.commit(&next, &records))
                .await?;
            self.learning
                .forget_children(&next.artifact_id, &[variant_id.to_string()])
                .await;
            info!(cluster_id, variant_id, "variant archived");
        }
        Ok(next)
    }

    pub async fn record_node_metrics(&self, metrics: NodeMetrics) -> DomainResult<()> {
        self.learning.record_execution(metrics).await
    }

    #[instrument(skip(self))]
    pub async fn learn_from_children(
        &self,
        parent_node_id: &str,
        goal: OptimizationGoal,
    ) -> DomainResult<Option<NodeLearning>> {
        self.learning.learn_from_children(parent_node_id, goal).await
    }

    pub async fn record_strategy_preference(
        &self,
        task_pattern: &str,
        strategy: OptimizationStrategy,
        quality: f64,
        speed_ms: f64,
    ) {
        self.learning
            .record_strategy_preference(task_pattern, strategy, quality, speed_ms)
            .await;
    }

    pub async fn get_best_strategy(&self, task_pattern: &str) -> Option<StrategyPreference> {
        self.learning.get_best_strategy(task_pattern).await
    }

    pub async fn resolve_strategy(&self, task_pattern: &str) -> OptimizationStrategy {
        self.learning.resolve_strategy(task_pattern).await
    }
}
