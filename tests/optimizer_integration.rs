//! End-to-end behaviour of the optimizer facade over scripted services.

mod common;

use common::{content, optimizer_with, seed, test_config, try_optimizer_with_config};
use variant_forge::domain::models::{
    ArtifactKind, GenerationMode, NodeMetrics, OptimizationGoal, OptimizationStrategy,
    PressureLevel, RunStatus, Termination, VariantStatus,
};
use variant_forge::services::OptimizeRequest;
use variant_forge::{ClusterRepository, DomainError};

#[tokio::test]
async fn test_register_scores_and_promotes_first_variant() {
    let fx = optimizer_with(vec![]);
    let variant = seed("parse", 0.6, 1.0, 0.0);
    let id = variant.variant_id.clone();

    let cluster = fx
        .optimizer
        .register_variant("parse", ArtifactKind::Function, variant, PressureLevel::Medium)
        .await
        .unwrap();

    let canonical = cluster.canonical().unwrap();
    assert_eq!(canonical.variant_id, id);
    assert_eq!(canonical.status, VariantStatus::Canonical);
    assert!(canonical.fitness.is_some());
    assert_eq!(canonical.embedding, vec![1.0, 0.0]);
    assert_eq!(cluster.promotions.len(), 1);
    assert!(fx.repository.get("parse").await.unwrap().is_some());
}

#[tokio::test]
async fn test_optimize_promotes_fitter_variant() {
    let fx = optimizer_with(vec![content(0.9, 0.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    let report = fx.optimizer.optimize("parse", "radical", Some(1), "medium").await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.termination, Termination::MaxIterations);
    assert_eq!(report.strategy, Some(OptimizationStrategy::Radical));
    assert_eq!(report.pressure_level, Some(PressureLevel::Medium));
    assert_eq!(report.iterations.len(), 1);
    assert!(report.iterations[0].promoted);
    assert_eq!(report.promotions.len(), 1);
    assert_eq!(report.statistics.active, 2);
    assert_eq!(report.statistics.niches, 2);

    let canonical = report.final_canonical.unwrap();
    assert_eq!(canonical.content, content(0.9, 0.0, 1.0));

    let stored = fx.optimizer.get_cluster_state("parse").await.unwrap();
    assert_eq!(stored.canonical().unwrap().variant_id, canonical.variant_id);
}

#[tokio::test]
async fn test_auto_strategy_uses_fallback_then_learned_preference() {
    let fx = optimizer_with(vec![content(0.9, 0.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    assert_eq!(
        fx.optimizer.resolve_strategy("parse").await,
        test_config().learning.fallback_strategy
    );

    let first = fx.optimizer.optimize("parse", "radical", Some(1), "medium").await;
    assert_eq!(first.status, RunStatus::Completed);
    let preference = fx.optimizer.get_best_strategy("parse").await.unwrap();
    assert_eq!(preference.strategy, OptimizationStrategy::Radical);

    let second = fx.optimizer.optimize("parse", "auto", Some(1), "medium").await;
    assert_eq!(second.strategy, Some(OptimizationStrategy::Radical));
}

#[tokio::test]
async fn test_bad_inputs_produce_failed_reports() {
    let fx = optimizer_with(vec![]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    let bad_level = fx.optimizer.optimize("parse", "hybrid", Some(1), "extreme").await;
    assert_eq!(bad_level.status, RunStatus::Failed);
    assert_eq!(bad_level.termination, Termination::Configuration);
    assert!(bad_level.reason.unwrap().contains("extreme"));

    let bad_strategy = fx.optimizer.optimize("parse", "genetic", Some(1), "medium").await;
    assert_eq!(bad_strategy.status, RunStatus::Failed);
    assert!(bad_strategy.reason.unwrap().contains("genetic"));

    let missing = fx.optimizer.optimize("nope", "hybrid", Some(1), "medium").await;
    assert_eq!(missing.status, RunStatus::Failed);
    assert!(missing.reason.unwrap().contains("nope"));
    assert!(missing.iterations.is_empty());

    assert!(matches!(
        fx.optimizer.get_cluster_state("nope").await,
        Err(DomainError::ClusterNotFound(_))
    ));
    assert!(matches!(
        fx.optimizer.archive_variant("nope", "v1").await,
        Err(DomainError::ClusterNotFound(_))
    ));
    assert_eq!(fx.optimizer.tracked_clusters().await, 1);
}

#[tokio::test]
async fn test_unknown_clusters_do_not_accumulate_locks() {
    let fx = optimizer_with(vec![]);
    let requests: Vec<OptimizeRequest> = (0..20)
        .map(|i| OptimizeRequest {
            cluster_id: format!("ghost-{i}"),
            strategy: "hybrid".to_string(),
            max_iterations: Some(1),
            pressure_level: "medium".to_string(),
        })
        .collect();

    let reports = fx.optimizer.optimize_many(&requests).await;

    assert!(reports.iter().all(|r| r.status == RunStatus::Failed));
    assert_eq!(fx.optimizer.tracked_clusters().await, 0);
}

#[tokio::test]
async fn test_nan_quality_never_displaces_canonical() {
    let fx = optimizer_with(vec![]);
    let good = seed("parse", 0.95, 1.0, 0.0);
    let good_id = good.variant_id.clone();
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, good, PressureLevel::Medium)
        .await
        .unwrap();

    let cluster = fx
        .optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", f64::NAN, 0.0, 1.0), PressureLevel::Medium)
        .await
        .unwrap();

    assert_eq!(cluster.canonical().unwrap().variant_id, good_id);
    assert_eq!(cluster.alternates.len(), 1);
    assert!(cluster.alternates[0].overall_score().is_finite());
}

#[tokio::test]
async fn test_generator_failures_leave_cluster_untouched() {
    let fx = optimizer_with(vec![]);
    let before = fx
        .optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    let report = fx.optimizer.optimize("parse", "incremental", Some(2), "medium").await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.termination, Termination::AllFailed);
    assert!(report.iterations.iter().all(|i| i.is_failed()));
    assert_eq!(fx.optimizer.get_cluster_state("parse").await.unwrap(), before);
}

#[tokio::test]
async fn test_incremental_requests_carry_risk_ceiling() {
    let fx = optimizer_with(vec![content(0.7, 0.9, 0.1)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    fx.optimizer.optimize("parse", "incremental", Some(1), "medium").await;

    let seen = fx.generator.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].mode, GenerationMode::Incremental);
    assert!(seen[0].max_risk.is_some());
}

#[tokio::test]
async fn test_optimize_many_runs_each_cluster() {
    let fx = optimizer_with(vec![content(0.8, 0.0, 1.0), content(0.8, 0.0, 1.0)]);
    for id in ["alpha", "beta"] {
        fx.optimizer
            .register_variant(id, ArtifactKind::Function, seed(id, 0.5, 1.0, 0.0), PressureLevel::Low)
            .await
            .unwrap();
    }

    let requests: Vec<OptimizeRequest> = ["alpha", "beta"]
        .iter()
        .map(|id| OptimizeRequest {
            cluster_id: (*id).to_string(),
            strategy: "radical".to_string(),
            max_iterations: Some(1),
            pressure_level: "low".to_string(),
        })
        .collect();

    let reports = fx.optimizer.optimize_many(&requests).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].cluster_id, "alpha");
    assert_eq!(reports[1].cluster_id, "beta");
    assert!(reports.iter().all(|r| r.status == RunStatus::Completed));
}

#[tokio::test]
async fn test_same_cluster_runs_serialize() {
    let fx = optimizer_with(vec![content(0.7, 0.0, 1.0), content(0.8, 1.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    let request = OptimizeRequest {
        cluster_id: "parse".to_string(),
        strategy: "radical".to_string(),
        max_iterations: Some(1),
        pressure_level: "medium".to_string(),
    };
    let reports = fx
        .optimizer
        .optimize_many(&[request.clone(), request])
        .await;

    assert!(reports.iter().all(|r| r.status == RunStatus::Completed));
    let cluster = fx.optimizer.get_cluster_state("parse").await.unwrap();
    assert_eq!(cluster.size(), 3);
    cluster.validate().unwrap();
}

#[tokio::test]
async fn test_archive_variant_is_idempotent() {
    let fx = optimizer_with(vec![content(0.9, 0.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();
    fx.optimizer.optimize("parse", "radical", Some(1), "medium").await;

    let cluster = fx.optimizer.get_cluster_state("parse").await.unwrap();
    let alternate = cluster.alternates[0].variant_id.clone();
    let canonical = cluster.canonical().unwrap().variant_id.clone();

    let after = fx.optimizer.archive_variant("parse", &alternate).await.unwrap();
    assert!(after.is_archived(&alternate));
    assert!(after.alternates.is_empty());

    let again = fx.optimizer.archive_variant("parse", &alternate).await.unwrap();
    assert_eq!(again, after);
    assert_eq!(fx.repository.archived_count().await, 1);

    let record = fx.repository.get_variant(&alternate).await.unwrap().unwrap();
    assert_eq!(record.status, VariantStatus::Archived);

    assert!(fx.optimizer.archive_variant("parse", &canonical).await.is_err());
}

#[tokio::test]
async fn test_archived_alternate_is_never_recommended() {
    let fx = optimizer_with(vec![content(0.9, 0.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();
    fx.optimizer.optimize("parse", "radical", Some(1), "medium").await;

    let cluster = fx.optimizer.get_cluster_state("parse").await.unwrap();
    let alternate = cluster.alternates[0].variant_id.clone();
    for (child, quality, speed) in [(alternate.as_str(), 0.97, 300.0), ("shortcut", 0.5, 20.0)] {
        fx.optimizer
            .record_node_metrics(NodeMetrics::new(child, quality, speed, true).under("parse"))
            .await
            .unwrap();
    }
    let before = fx
        .optimizer
        .learn_from_children("parse", OptimizationGoal::Quality)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.recommendation, alternate);

    fx.optimizer.archive_variant("parse", &alternate).await.unwrap();

    let after = fx
        .optimizer
        .learn_from_children("parse", OptimizationGoal::Quality)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(after.recommendation, alternate);
    assert_eq!(after.recommendation, cluster.canonical().unwrap().variant_id);
}

#[tokio::test]
async fn test_high_pressure_trims_weak_alternates() {
    let fx = optimizer_with(vec![content(1.0, 0.0, 1.0)]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.1, 1.0, 0.0), PressureLevel::High)
        .await
        .unwrap();

    let report = fx.optimizer.optimize("parse", "radical", Some(1), "high").await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.iterations[0].archived_ids.len(), 1);
    assert_eq!(report.statistics.active, 1);
    assert_eq!(report.statistics.archived, 1);
}

#[tokio::test]
async fn test_learn_from_children_recommends_per_goal() {
    let fx = optimizer_with(vec![]);
    for (child, quality, speed) in [("fast", 0.70, 45.0), ("accurate", 0.95, 120.0)] {
        for _ in 0..3 {
            fx.optimizer
                .record_node_metrics(NodeMetrics::new(child, quality, speed, true).under("pipeline"))
                .await
                .unwrap();
        }
    }

    let quality = fx
        .optimizer
        .learn_from_children("pipeline", OptimizationGoal::Quality)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quality.recommendation, "accurate");

    let speed = fx
        .optimizer
        .learn_from_children("pipeline", OptimizationGoal::Speed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(speed.recommendation, "fast");
    assert!(speed.confidence > 0.0 && speed.confidence <= 1.0);

    assert!(fx
        .optimizer
        .learn_from_children("unknown", OptimizationGoal::Balanced)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_shutdown_rejects_new_work() {
    let fx = optimizer_with(vec![]);
    fx.optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.6, 1.0, 0.0), PressureLevel::Medium)
        .await
        .unwrap();

    fx.optimizer.shutdown().await;
    assert!(!fx.optimizer.is_running());

    let err = fx
        .optimizer
        .register_variant("parse", ArtifactKind::Function, seed("parse", 0.7, 0.0, 1.0), PressureLevel::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ShutDown));

    let report = fx.optimizer.optimize("parse", "hybrid", Some(1), "medium").await;
    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.reason.unwrap().contains("shut down"));
}

#[tokio::test]
async fn test_invalid_pressure_table_rejected_at_init() {
    let mut config = test_config();
    if let Some(high) = config.pressure.get_mut(&PressureLevel::High) {
        high.similarity_threshold = 1.5;
    }
    let result = try_optimizer_with_config(config, vec![]);
    assert!(matches!(result, Err(DomainError::Configuration(msg)) if msg.contains("high")));
}
