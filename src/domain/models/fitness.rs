//! Fitness domain models.
//!
//! A [`FitnessEvaluation`] is the canonical, comparable summary of one scored
//! execution. It is produced by the fitness evaluator from [`RawMetrics`]
//! returned by the execution harness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// Raw numbers returned by the external execution harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    /// Process exit status; non-zero means failure.
    pub exit_code: i32,
    /// Error raised during execution, if any. Also counts as failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: f64,
    /// Peak memory in megabytes.
    #[serde(default)]
    pub memory_mb: f64,
    /// Externally computed quality proxy in [0, 1] (e.g. an LLM judge).
    #[serde(default)]
    pub quality: Option<f64>,
    /// Fraction of the test suite exercised, in [0, 1].
    #[serde(default)]
    pub test_coverage: Option<f64>,
}

impl RawMetrics {
    /// Successful run with the given quality proxy and latency.
    pub fn success(quality: f64, latency_ms: f64) -> Self {
        Self {
            exit_code: 0,
            error: None,
            latency_ms,
            memory_mb: 0.0,
            quality: Some(quality),
            test_coverage: None,
        }
    }

    /// Failed run.
    pub fn failure(error: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            exit_code: 1,
            error: Some(error.into()),
            latency_ms,
            memory_mb: 0.0,
            quality: None,
            test_coverage: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Categorical verdict attached to every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Fail,
    /// Execution succeeded but no quality signal was available.
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Excellent => "excellent",
            Verdict::Good => "good",
            Verdict::Acceptable => "acceptable",
            Verdict::Poor => "poor",
            Verdict::Fail => "fail",
            Verdict::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a comparison should optimize for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    #[default]
    Balanced,
    Quality,
    Speed,
}

impl OptimizationGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationGoal::Balanced => "balanced",
            OptimizationGoal::Quality => "quality",
            OptimizationGoal::Speed => "speed",
        }
    }
}

impl fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationGoal {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            "speed" => Ok(Self::Speed),
            other => Err(DomainError::Configuration(format!(
                "unknown optimization goal '{other}'"
            ))),
        }
    }
}

/// Scored summary of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessEvaluation {
    /// Weighted combination of the component scores, in [0, 1].
    pub overall_score: f64,
    pub quality_score: f64,
    pub speed_score: f64,
    pub correctness_score: f64,
    pub verdict: Verdict,
    /// Latency carried through for tie-breaking.
    pub latency_ms: f64,
}

impl FitnessEvaluation {
    /// The score a comparison under `goal` ranks by.
    pub fn score_for(&self, goal: OptimizationGoal) -> f64 {
        match goal {
            OptimizationGoal::Balanced => self.overall_score,
            OptimizationGoal::Quality => self.quality_score,
            OptimizationGoal::Speed => self.speed_score,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.verdict == Verdict::Fail
    }
}

/// Score as used for ordering. Non-finite values rank below every real score.
pub fn rankable_score(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        f64::NEG_INFINITY
    }
}

/// Latency as used for ordering. Non-finite values rank slowest.
pub fn rankable_latency(latency_ms: f64) -> f64 {
    if latency_ms.is_finite() {
        latency_ms
    } else {
        f64::INFINITY
    }
}
