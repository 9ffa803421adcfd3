//! Optimization loop.
//!
//! Each iteration runs on a working copy of the cluster:
//! 1. Generate: ask the generator for a variant under the strategy's constraints
//! 2. Measure: embed it and run it through the execution harness
//! 3. Score, admit, trim and validate the working copy
//! 4. Commit: persist the cluster and its archived records in one write
//!
//! Only a fully committed iteration advances the loop's cluster, so an
//! abandoned or cancelled iteration leaves the last committed state intact.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

use super::clustering::{Admission, ClusteringEngine};
use super::fitness_evaluator::FitnessEvaluator;
use super::hierarchical_learning::HierarchicalLearning;
use super::retry::RetryPolicy;
use super::trimming::{TrimOutcome, TrimmingPolicy};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArtifactVariant, GenerationConstraints, GenerationMode, IterationResult, NodeLearning,
    NodeMetrics, OptimizationCluster, OptimizationStrategy, PerformanceMetrics,
    PressureAdjustments, PressureLevel, RunStatus, Termination,
};
use crate::domain::ports::{
    ClusterRepository, EmbeddingProvider, ExecutionHarness, ExecutionRequest, VariantGenerator,
};

/// External collaborators the loop calls out to.
#[derive(Clone)]
pub struct LoopServices {
    pub generator: Arc<dyn VariantGenerator>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub harness: Arc<dyn ExecutionHarness>,
    pub repository: Arc<dyn ClusterRepository>,
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub strategy: OptimizationStrategy,
    pub pressure_level: PressureLevel,
    pub adjustments: PressureAdjustments,
    pub max_iterations: usize,
    /// Benchmark input handed to the harness on every execution.
    pub input: Value,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Last committed cluster.
    pub cluster: OptimizationCluster,
    pub iterations: Vec<IterationResult>,
    pub archived: Vec<ArtifactVariant>,
    pub termination: Termination,
    pub reason: Option<String>,
    /// Learnings consulted by guided generation.
    pub learnings_used: Vec<NodeLearning>,
}

impl LoopOutcome {
    pub fn status(&self) -> RunStatus {
        match self.termination {
            Termination::InvariantViolation | Termination::Configuration | Termination::AllFailed => {
                RunStatus::Failed
            }
            Termination::MaxIterations | Termination::Plateau => {
                if self.iterations.iter().any(IterationResult::is_failed) {
                    RunStatus::Partial
                } else {
                    RunStatus::Completed
                }
            }
        }
    }
}

/// A fully committed iteration.
struct Step {
    cluster: OptimizationCluster,
    result: IterationResult,
    archived: Vec<ArtifactVariant>,
    variant: ArtifactVariant,
}

pub struct OptimizationLoop {
    services: LoopServices,
    evaluator: FitnessEvaluator,
    engine: ClusteringEngine,
    policy: TrimmingPolicy,
    retry: RetryPolicy,
    learning: Arc<HierarchicalLearning>,
    plateau_window: usize,
}

impl OptimizationLoop {
    pub fn new(
        services: LoopServices,
        evaluator: FitnessEvaluator,
        retry: RetryPolicy,
        learning: Arc<HierarchicalLearning>,
        plateau_window: usize,
    ) -> Self {
        Self {
            services,
            evaluator,
            engine: ClusteringEngine::new(),
            policy: TrimmingPolicy::new(),
            retry,
            learning,
            plateau_window,
        }
    }

    /// Run up to `request.max_iterations` iterations against `cluster`.
    ///
    /// Never fails as a whole: abandoned iterations are recorded and the
    /// termination reason says why the run stopped.
    #[instrument(skip(self, cluster, request), fields(
        cluster_id = %cluster.cluster_id,
        strategy = %request.strategy,
        pressure = %request.pressure_level,
        max_iterations = request.max_iterations
    ))]
    pub async fn run(&self, cluster: OptimizationCluster, request: &LoopRequest) -> LoopOutcome {
        let mut committed = cluster;
        let hint = match request.strategy {
            OptimizationStrategy::BestOfBreed => {
                self.learning.best_learning(&committed.artifact_id).await
            }
            _ => None,
        };

        let mut iterations: Vec<IterationResult> = Vec::new();
        let mut archived = Vec::new();
        let mut learnings_used: Vec<NodeLearning> = Vec::new();
        let mut termination = Termination::MaxIterations;
        let mut reason = None;
        let mut since_promotion = 0usize;
        let plateau_enabled =
            request.pressure_level != PressureLevel::Training && self.plateau_window > 0;

        for index in 0..request.max_iterations {
            let number = index + 1;
            let mode = if committed.is_empty() {
                GenerationMode::Seed
            } else {
                request.strategy.mode_for(index)
            };
            let guidance = match mode {
                GenerationMode::Guided => hint.as_ref(),
                _ => None,
            };

            let span = tracing::info_span!("iteration", iteration = number, mode = ?mode);
            let step = self
                .iterate(&committed, number, mode, request, guidance)
                .instrument(span)
                .await;

            match step {
                Ok(step) => {
                    if let Some(learning) = guidance {
                        self.learning.mark_used(&learning.context_signature).await;
                        if !learnings_used
                            .iter()
                            .any(|l| l.context_signature == learning.context_signature)
                        {
                            learnings_used.push(learning.clone());
                        }
                    }
                    self.record_node(&committed.artifact_id, &step.variant).await;
                    self.learning
                        .forget_children(&committed.artifact_id, &step.result.archived_ids)
                        .await;

                    since_promotion = if step.result.promoted {
                        0
                    } else {
                        since_promotion + 1
                    };
                    archived.extend(step.archived);
                    committed = step.cluster;
                    iterations.push(step.result);
                }
                Err(err) if err.is_fatal() => {
                    error!(iteration = number, error = %err, "aborting optimization run");
                    termination = match &err {
                        DomainError::InvariantViolation(_) => Termination::InvariantViolation,
                        _ => Termination::Configuration,
                    };
                    reason = Some(err.to_string());
                    iterations.push(IterationResult::failed(number, mode, err.to_string()));
                    break;
                }
                Err(err) => {
                    warn!(iteration = number, error = %err, "iteration abandoned");
                    iterations.push(IterationResult::failed(number, mode, err.to_string()));
                    continue;
                }
            }

            if plateau_enabled && since_promotion >= self.plateau_window {
                info!(iteration = number, window = self.plateau_window, "plateau reached");
                termination = Termination::Plateau;
                reason = Some(format!(
                    "no promotion in {} consecutive iterations",
                    self.plateau_window
                ));
                break;
            }
        }

        if termination == Termination::MaxIterations
            && !iterations.is_empty()
            && iterations.iter().all(IterationResult::is_failed)
        {
            termination = Termination::AllFailed;
            reason = iterations
                .last()
                .and_then(|i| i.error.clone())
                .map(|e| format!("all {} iterations failed; last error: {e}", iterations.len()));
        }

        LoopOutcome {
            cluster: committed,
            iterations,
            archived,
            termination,
            reason,
            learnings_used,
        }
    }

    async fn iterate(
        &self,
        cluster: &OptimizationCluster,
        number: usize,
        mode: GenerationMode,
        request: &LoopRequest,
        guidance: Option<&NodeLearning>,
    ) -> DomainResult<Step> {
        let adjustments = &request.adjustments;
        let mut constraints =
            GenerationConstraints::for_mode(mode, adjustments.specialization_bias);
        if let Some(learning) = guidance {
            constraints = constraints.with_hint(learning.recommendation.clone());
        }

        let canonical = cluster.canonical_variant.as_ref();
        let generator = &self.services.generator;
        let generated = self
            .retry
            .execute(generator.name(), || {
                generator.generate_variant(&cluster.artifact_id, canonical, &constraints)
            })
            .await?;
        constraints.check(&generated.semantic_deltas)?;

        let embedder = &self.services.embedder;
        let embedding = self
            .retry
            .execute(embedder.name(), || embedder.embed(&generated.content))
            .await?;

        let harness = &self.services.harness;
        let execution = ExecutionRequest {
            artifact_kind: cluster.artifact_kind,
            content: generated.content.clone(),
            input: request.input.clone(),
        };
        let raw = self
            .retry
            .execute(harness.name(), || harness.execute_and_measure(execution.clone()))
            .await?;

        let fitness = self.evaluator.score(&raw);
        let variant = ArtifactVariant::new(
            cluster.artifact_id.clone(),
            cluster.next_version(),
            generated.content,
            embedding,
        )
        .with_performance(PerformanceMetrics {
            latency_ms: raw.latency_ms,
            memory_mb: raw.memory_mb,
            success_rate: if raw.succeeded() { 1.0 } else { 0.0 },
            test_coverage: raw.test_coverage.unwrap_or(0.0),
        })
        .with_fitness(fitness.clone())
        .with_deltas(generated.semantic_deltas);

        let admission = self.engine.admit(cluster, variant.clone(), adjustments)?;
        let trimmed = self.policy.trim(&admission.cluster, adjustments)?;
        trimmed.cluster.validate()?;

        let mut insights = describe(&admission, &trimmed, &variant, request, guidance);
        if let Some(err) = raw.error.as_deref() {
            insights.push(format!("execution failed: {err}"));
        } else if !raw.succeeded() {
            insights.push(format!("execution exited with status {}", raw.exit_code));
        }

        self.commit(&trimmed).await?;
        debug!(
            variant_id = %variant.variant_id,
            score = fitness.overall_score,
            promoted = admission.promoted,
            archived = trimmed.archived_ids.len(),
            "iteration committed"
        );

        Ok(Step {
            result: IterationResult {
                iteration: number,
                mode,
                variant_id: Some(variant.variant_id.clone()),
                promoted: admission.promoted,
                fitness: Some(fitness),
                archived_ids: trimmed.archived_ids.clone(),
                insights,
                error: None,
            },
            cluster: trimmed.cluster,
            archived: trimmed.archived,
            variant,
        })
    }

    async fn commit(&self, trimmed: &TrimOutcome) -> DomainResult<()> {
        let repository = &self.services.repository;
        self.retry
            .execute("repository", || {
                repository.commit(&trimmed.cluster, &trimmed.archived)
            })
            .await
    }

    /// Feed the scored variant to the learning tables as a child of its artifact.
    async fn record_node(&self, artifact_id: &str, variant: &ArtifactVariant) {
        let Some(fitness) = variant.fitness.as_ref() else {
            return;
        };
        let metrics = NodeMetrics::new(
            variant.variant_id.clone(),
            fitness.quality_score,
            fitness.latency_ms,
            !fitness.is_failure(),
        )
        .under(artifact_id);
        if let Err(err) = self.learning.record_execution(metrics).await {
            debug!(variant_id = %variant.variant_id, error = %err, "node metrics not recorded");
        }
    }
}

fn describe(
    admission: &Admission,
    trimmed: &TrimOutcome,
    variant: &ArtifactVariant,
    request: &LoopRequest,
    guidance: Option<&NodeLearning>,
) -> Vec<String> {
    let mut insights = Vec::new();
    let score = variant.overall_score();

    if admission.promoted {
        insights.push(format!("promoted {} to canonical at {score:.3}", variant.variant_id));
    } else if let Some(canonical) = admission.cluster.canonical_variant.as_ref() {
        insights.push(format!(
            "{} ranked as alternate at {score:.3} (canonical {:.3})",
            variant.variant_id,
            canonical.overall_score()
        ));
    }

    match (admission.joined_existing_niche, admission.nearest_distance) {
        (true, Some(distance)) => insights.push(format!(
            "joined niche {} at distance {distance:.3}",
            admission.niche
        )),
        _ => insights.push(format!("opened niche {}", admission.niche)),
    }

    if !trimmed.archived_ids.is_empty() {
        insights.push(format!(
            "archived {} variant(s) under {} pressure",
            trimmed.archived_ids.len(),
            request.pressure_level
        ));
    }
    if !trimmed.floor_protected.is_empty() {
        insights.push(format!(
            "size floor retained {} variant(s) outside the fitness budget",
            trimmed.floor_protected.len()
        ));
    }

    if !variant.semantic_deltas.is_empty() {
        let bias = request.adjustments.specialization_bias;
        let benefit: f64 = variant
            .semantic_deltas
            .iter()
            .map(|d| d.weighted_benefit(bias))
            .sum();
        insights.push(format!(
            "expected benefit {benefit:.2} across {} delta(s) at specialization bias {bias:.2}",
            variant.semantic_deltas.len()
        ));
    }

    if let Some(learning) = guidance {
        insights.push(format!(
            "guided by {} (confidence {:.2})",
            learning.recommendation, learning.confidence
        ));
    }

    insights
}
