//! Common test utilities for integration tests
//!
//! Provides scripted stand-ins for the external services and an optimizer
//! builder wired to them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use variant_forge::adapters::InMemoryClusterRepository;
use variant_forge::domain::models::{
    ArtifactVariant, Config, GeneratedVariant, GenerationConstraints, RawMetrics,
};
use variant_forge::domain::ports::{
    EmbeddingProvider, ExecutionHarness, ExecutionRequest, VariantGenerator,
};
use variant_forge::infrastructure::config::ConfigPressureSource;
use variant_forge::services::{Optimizer, OptimizerPorts};
use variant_forge::{DomainError, DomainResult};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Variant content understood by [`ContentEmbedder`] and [`ContentHarness`]:
/// `q=<quality>;e=<x>,<y>`.
pub fn content(quality: f64, x: f32, y: f32) -> String {
    format!("q={quality};e={x},{y}")
}

/// Generator handing out a fixed sequence of contents, then failing.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<GenerationConstraints>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, next: String) {
        self.script.lock().unwrap().push_back(next);
    }

    pub fn seen(&self) -> Vec<GenerationConstraints> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VariantGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate_variant(
        &self,
        _artifact_id: &str,
        _current_canonical: Option<&ArtifactVariant>,
        constraints: &GenerationConstraints,
    ) -> DomainResult<GeneratedVariant> {
        self.seen.lock().unwrap().push(constraints.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(content) => Ok(GeneratedVariant {
                content,
                semantic_deltas: Vec::new(),
            }),
            None => Err(DomainError::ValidationFailed("script exhausted".into())),
        }
    }
}

/// Reads the embedding straight out of the content.
pub struct ContentEmbedder;

#[async_trait]
impl EmbeddingProvider for ContentEmbedder {
    fn name(&self) -> &'static str {
        "content"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        let coords = text
            .split(";e=")
            .nth(1)
            .ok_or_else(|| DomainError::ValidationFailed("no embedding in content".into()))?;
        Ok(coords
            .split(',')
            .filter_map(|c| c.parse::<f32>().ok())
            .collect())
    }
}

/// Reads the quality straight out of the content; latency is fixed.
pub struct ContentHarness;

#[async_trait]
impl ExecutionHarness for ContentHarness {
    fn name(&self) -> &'static str {
        "content"
    }

    async fn execute_and_measure(&self, request: ExecutionRequest) -> DomainResult<RawMetrics> {
        let quality = request
            .content
            .strip_prefix("q=")
            .and_then(|rest| rest.split(';').next())
            .and_then(|q| q.parse::<f64>().ok())
            .ok_or_else(|| DomainError::ValidationFailed("no quality in content".into()))?;
        Ok(RawMetrics::success(quality, 100.0))
    }
}

/// Default configuration with retries that do not slow tests down.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.max_retries = 1;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config
}

pub struct TestOptimizer {
    pub optimizer: Optimizer,
    pub generator: Arc<ScriptedGenerator>,
    pub repository: Arc<InMemoryClusterRepository>,
}

pub fn optimizer_with(script: Vec<String>) -> TestOptimizer {
    optimizer_with_config(test_config(), script)
}

pub fn optimizer_with_config(config: Config, script: Vec<String>) -> TestOptimizer {
    try_optimizer_with_config(config, script).expect("optimizer init")
}

pub fn try_optimizer_with_config(config: Config, script: Vec<String>) -> DomainResult<TestOptimizer> {
    let generator = Arc::new(ScriptedGenerator::new(script));
    let repository = Arc::new(InMemoryClusterRepository::new());
    let ports = OptimizerPorts {
        generator: generator.clone(),
        embedder: Arc::new(ContentEmbedder),
        harness: Arc::new(ContentHarness),
        repository: repository.clone(),
        pressure_source: Arc::new(ConfigPressureSource::from_config(&config)),
    };
    let optimizer = Optimizer::init(config, ports)?;
    Ok(TestOptimizer {
        optimizer,
        generator,
        repository,
    })
}

/// Unscored seed variant; the optimizer embeds and measures it on registration.
pub fn seed(artifact_id: &str, quality: f64, x: f32, y: f32) -> ArtifactVariant {
    ArtifactVariant::new(artifact_id, "1.0", content(quality, x, y), Vec::new())
}
