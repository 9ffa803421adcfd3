//! Simulation command: full optimization runs against synthetic services.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::adapters::{
    InMemoryClusterRepository, SyntheticEmbedder, SyntheticGenerator, SyntheticToolInvoker,
};
use crate::cli::display::list_table;
use crate::cli::output::{output, score, truncate, CommandOutput};
use crate::domain::models::{
    ArtifactKind, ArtifactVariant, Config, NodeLearning, OptimizationReport, PressureLevel,
    ToolKind,
};
use crate::domain::ports::{PressureConfigSource, ToolInvoker};
use crate::infrastructure::config::ConfigPressureSource;
use crate::services::{
    OptimizeRequest, Optimizer, OptimizerPorts, ToolDispatcher, ToolExecutionHarness,
};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Artifact to optimize; suffixed with an index when simulating several clusters
    #[arg(short, long, default_value = "parse_records")]
    pub artifact: String,

    /// Artifact kind (function, prompt, workflow, sub_workflow)
    #[arg(short, long, default_value = "function")]
    pub kind: String,

    /// Strategy (best_of_breed, incremental, radical, hybrid or auto); defaults to the configured one
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Pressure level
    #[arg(short, long, default_value = "medium")]
    pub pressure: String,

    /// Iterations per run; defaults to the configured maximum
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Number of independent clusters optimized concurrently
    #[arg(long, default_value_t = 1)]
    pub clusters: usize,

    /// Optimization rounds; later rounds benefit from earlier learnings
    #[arg(long, default_value_t = 1)]
    pub rounds: usize,

    /// One in N synthetic executions fails (0 disables failures)
    #[arg(long, default_value_t = 13)]
    pub failure_modulus: u64,

    /// Embedding dimension of the synthetic embedder
    #[arg(long, default_value_t = 16)]
    pub dimension: usize,

    /// Standalone pressure table (YAML) overriding the configured one
    #[arg(long)]
    pub pressure_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub round: usize,
    pub cluster_id: String,
    pub strategy: String,
    pub status: String,
    pub termination: String,
    pub iterations: usize,
    pub failed_iterations: usize,
    pub promotions: usize,
    pub canonical_version: Option<String>,
    pub canonical_score: Option<f64>,
    pub active: usize,
    pub archived: usize,
    pub niches: usize,
    pub reason: Option<String>,
}

impl RunSummary {
    fn new(round: usize, report: &OptimizationReport) -> Self {
        Self {
            round,
            cluster_id: report.cluster_id.clone(),
            strategy: report
                .strategy
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            status: report.status.as_str().to_string(),
            termination: report.termination.as_str().to_string(),
            iterations: report.iterations.len(),
            failed_iterations: report.iterations.iter().filter(|i| i.is_failed()).count(),
            promotions: report.promotion_count(),
            canonical_version: report.final_canonical.as_ref().map(|c| c.version.clone()),
            canonical_score: report.final_canonical.as_ref().map(ArtifactVariant::overall_score),
            active: report.statistics.active,
            archived: report.statistics.archived,
            niches: report.statistics.niches,
            reason: report.reason.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationOutput {
    pub runs: Vec<RunSummary>,
    pub learnings: Vec<NodeLearning>,
    #[serde(skip)]
    pub reports: Vec<OptimizationReport>,
}

impl CommandOutput for SimulationOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "round",
            "cluster",
            "strategy",
            "status",
            "stop",
            "iter",
            "failed",
            "promoted",
            "canonical",
            "score",
            "active",
            "archived",
            "niches",
        ]);
        for run in &self.runs {
            table.add_row(vec![
                run.round.to_string(),
                truncate(&run.cluster_id, 24),
                run.strategy.clone(),
                run.status.clone(),
                run.termination.clone(),
                run.iterations.to_string(),
                run.failed_iterations.to_string(),
                run.promotions.to_string(),
                run.canonical_version.clone().unwrap_or_else(|| "-".to_string()),
                score(run.canonical_score),
                run.active.to_string(),
                run.archived.to_string(),
                run.niches.to_string(),
            ]);
        }

        let mut lines = vec![table.to_string()];
        for run in self.runs.iter().filter(|r| r.reason.is_some()) {
            lines.push(format!(
                "{} (round {}): {}",
                run.cluster_id,
                run.round,
                run.reason.as_deref().unwrap_or_default()
            ));
        }
        if !self.learnings.is_empty() {
            lines.push(String::new());
            lines.push("Learned patterns:".to_string());
            for learning in &self.learnings {
                lines.push(format!(
                    "  {} -> {} ({}, confidence {:.2})",
                    learning.node_id, learning.recommendation, learning.goal, learning.confidence
                ));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "runs": self.runs,
            "learnings": self.learnings,
            "reports": self.reports,
        })
    }
}

/// Wire an optimizer to the deterministic synthetic services.
pub fn synthetic_optimizer(config: &Config, args: &SimulateArgs) -> Result<Optimizer> {
    let pressure_source: Arc<dyn PressureConfigSource> = match &args.pressure_file {
        Some(path) => Arc::new(ConfigPressureSource::from_yaml_file(path)?),
        None => Arc::new(ConfigPressureSource::from_config(config)),
    };

    let invoker: Arc<dyn ToolInvoker> = Arc::new(SyntheticToolInvoker::new(args.failure_modulus));
    let dispatcher = [
        ToolKind::Llm,
        ToolKind::Executable,
        ToolKind::OpenApi,
        ToolKind::Workflow,
    ]
    .into_iter()
    .fold(ToolDispatcher::new(), |dispatcher, kind| {
        dispatcher.with_invoker(kind, Arc::clone(&invoker))
    });

    let ports = OptimizerPorts {
        generator: Arc::new(SyntheticGenerator::new()),
        embedder: Arc::new(SyntheticEmbedder::new(args.dimension)),
        harness: Arc::new(ToolExecutionHarness::new(dispatcher)),
        repository: Arc::new(InMemoryClusterRepository::new()),
        pressure_source,
    };
    Optimizer::init(config.clone(), ports).context("Failed to initialize optimizer")
}

pub async fn run(config: &Config, args: &SimulateArgs) -> Result<SimulationOutput> {
    let kind: ArtifactKind = args.kind.parse()?;
    let level: PressureLevel = args.pressure.parse()?;
    let strategy = args
        .strategy
        .clone()
        .unwrap_or_else(|| config.optimizer.default_strategy.to_string());

    let optimizer = synthetic_optimizer(config, args)?;

    let artifacts: Vec<String> = if args.clusters <= 1 {
        vec![args.artifact.clone()]
    } else {
        (1..=args.clusters)
            .map(|i| format!("{}-{i}", args.artifact))
            .collect()
    };

    for artifact_id in &artifacts {
        let seed = ArtifactVariant::new(
            artifact_id.as_str(),
            "1.0",
            format!("artifact {artifact_id}\nseed implementation\n"),
            Vec::new(),
        );
        optimizer
            .register_variant(artifact_id, kind, seed, level)
            .await
            .with_context(|| format!("Failed to seed cluster {artifact_id}"))?;
    }

    let requests: Vec<OptimizeRequest> = artifacts
        .iter()
        .map(|artifact_id| OptimizeRequest {
            cluster_id: artifact_id.clone(),
            strategy: strategy.clone(),
            max_iterations: args.iterations,
            pressure_level: args.pressure.clone(),
        })
        .collect();

    let mut runs = Vec::new();
    let mut reports = Vec::new();
    let mut learnings: Vec<NodeLearning> = Vec::new();
    for round in 1..=args.rounds.max(1) {
        info!(round, clusters = requests.len(), strategy = %strategy, "simulation round");
        for report in optimizer.optimize_many(&requests).await {
            runs.push(RunSummary::new(round, &report));
            for learning in &report.learned_patterns {
                learnings.retain(|l| l.node_id != learning.node_id || l.goal != learning.goal);
                learnings.push(learning.clone());
            }
            reports.push(report);
        }
    }

    optimizer.shutdown().await;
    Ok(SimulationOutput {
        runs,
        learnings,
        reports,
    })
}

pub async fn execute(args: SimulateArgs, config: &Config, json_mode: bool) -> Result<()> {
    output(&run(config, &args).await?, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RunStatus;

    fn args() -> SimulateArgs {
        SimulateArgs {
            artifact: "parse_records".to_string(),
            kind: "function".to_string(),
            strategy: Some("hybrid".to_string()),
            pressure: "medium".to_string(),
            iterations: Some(4),
            clusters: 2,
            rounds: 2,
            failure_modulus: 0,
            dimension: 16,
            pressure_file: None,
        }
    }

    #[tokio::test]
    async fn test_simulation_runs_every_cluster_each_round() {
        let out = run(&Config::default(), &args()).await.unwrap();
        assert_eq!(out.runs.len(), 4);
        assert!(out.runs.iter().all(|r| r.status == RunStatus::Completed.as_str()));
        assert!(out.runs.iter().all(|r| r.canonical_version.is_some()));
        assert!(out.to_human().contains("parse_records-1"));
    }

    #[tokio::test]
    async fn test_unknown_strategy_yields_failed_runs() {
        let mut args = args();
        args.strategy = Some("genetic".to_string());
        args.rounds = 1;
        let out = run(&Config::default(), &args).await.unwrap();
        assert!(out.runs.iter().all(|r| r.status == "failed"));
        assert!(out.runs[0].reason.as_deref().unwrap_or_default().contains("genetic"));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_an_error() {
        let mut args = args();
        args.kind = "spreadsheet".to_string();
        assert!(run(&Config::default(), &args).await.is_err());
    }
}
