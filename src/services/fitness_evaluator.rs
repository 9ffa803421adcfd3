//! Fitness evaluation: turns raw execution metrics into a comparable score
//! and a categorical verdict.
//!
//! The overall score is a weighted sum of three components in [0, 1]:
//! - **quality**: the external quality proxy (neutral when absent)
//! - **speed**: `ref / (ref + latency)`, so the reference latency scores 0.5
//! - **correctness**: 1.0 on success (slightly discounted by low coverage),
//!   0.0 on failure
//!
//! A failed execution is capped below the acceptable boundary no matter how
//! the other components score.

use std::cmp::Ordering;

use crate::domain::models::{
    rankable_latency, rankable_score, FitnessConfig, FitnessEvaluation, OptimizationGoal,
    RawMetrics, Verdict,
};

/// Stateless evaluator parameterized by [`FitnessConfig`].
#[derive(Debug, Clone, Default)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
}

impl FitnessEvaluator {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Highest score a failed execution can receive.
    pub fn failure_ceiling(&self) -> f64 {
        self.config.acceptable_threshold / 2.0
    }

    /// Score one execution.
    pub fn score(&self, raw: &RawMetrics) -> FitnessEvaluation {
        let succeeded = raw.succeeded();
        // A NaN or infinite judgement carries no information.
        let proxy = raw.quality.filter(|q| q.is_finite());
        let quality = proxy.unwrap_or(self.config.neutral_quality).clamp(0.0, 1.0);
        let correctness = if succeeded {
            raw.test_coverage
                .filter(|c| c.is_finite())
                .map_or(1.0, |c| 0.7 + 0.3 * c.clamp(0.0, 1.0))
        } else {
            0.0
        };

        let mut evaluation = self.combine(quality, raw.latency_ms, correctness, succeeded);
        if succeeded && proxy.is_none() {
            evaluation.verdict = Verdict::Unknown;
        }
        evaluation
    }

    /// Score aggregated node statistics as if they were one execution.
    ///
    /// The success rate stands in for correctness; a node that never
    /// succeeded is treated as a failure.
    pub fn score_aggregate(
        &self,
        mean_quality: f64,
        mean_latency_ms: f64,
        success_rate: f64,
    ) -> FitnessEvaluation {
        let success_rate = finite_or_zero(success_rate).clamp(0.0, 1.0);
        self.combine(
            finite_or_zero(mean_quality).clamp(0.0, 1.0),
            mean_latency_ms,
            success_rate,
            success_rate > 0.0,
        )
    }

    fn combine(
        &self,
        quality: f64,
        latency_ms: f64,
        correctness: f64,
        succeeded: bool,
    ) -> FitnessEvaluation {
        let speed = self.speed_score(latency_ms);

        let (wq, ws, wc) = self.normalized_weights();
        let weighted = (wq * quality + ws * speed + wc * correctness).clamp(0.0, 1.0);

        let (overall_score, verdict) = if succeeded {
            (weighted, self.verdict_for(weighted))
        } else {
            (weighted.min(self.failure_ceiling()), Verdict::Fail)
        };

        FitnessEvaluation {
            overall_score,
            quality_score: quality,
            speed_score: speed,
            correctness_score: correctness,
            verdict,
            latency_ms,
        }
    }

    fn speed_score(&self, latency_ms: f64) -> f64 {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return 0.0;
        }
        let reference = self.config.reference_latency_ms.max(f64::EPSILON);
        reference / (reference + latency_ms)
    }

    fn normalized_weights(&self) -> (f64, f64, f64) {
        let q = self.config.quality_weight.max(0.0);
        let s = self.config.speed_weight.max(0.0);
        let c = self.config.correctness_weight.max(0.0);
        let total = q + s + c;
        if total <= f64::EPSILON {
            return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        (q / total, s / total, c / total)
    }

    fn verdict_for(&self, score: f64) -> Verdict {
        if score >= self.config.excellent_threshold {
            Verdict::Excellent
        } else if score >= self.config.good_threshold {
            Verdict::Good
        } else if score >= self.config.acceptable_threshold {
            Verdict::Acceptable
        } else {
            Verdict::Poor
        }
    }

    /// Pick the best evaluation under `goal`.
    ///
    /// Ties on the goal's score fall back to `overall_score` descending, then
    /// lower latency. A complete tie keeps the earliest entry.
    pub fn compare<'a>(
        &self,
        evaluations: &'a [FitnessEvaluation],
        goal: OptimizationGoal,
    ) -> Option<&'a FitnessEvaluation> {
        let mut best: Option<&FitnessEvaluation> = None;
        for candidate in evaluations {
            best = match best {
                Some(current) if rank(candidate, current, goal) != Ordering::Less => Some(current),
                _ => Some(candidate),
            };
        }
        best
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Ordering where `Less` means `a` ranks ahead of `b`. Non-finite scores
/// rank last.
pub fn rank(a: &FitnessEvaluation, b: &FitnessEvaluation, goal: OptimizationGoal) -> Ordering {
    rankable_score(b.score_for(goal))
        .total_cmp(&rankable_score(a.score_for(goal)))
        .then_with(|| rankable_score(b.overall_score).total_cmp(&rankable_score(a.overall_score)))
        .then_with(|| rankable_latency(a.latency_ms).total_cmp(&rankable_latency(b.latency_ms)))
}
