// Composite performance score.
//
// Each scored metric is rated good / needs-improvement / poor against fixed
// boundaries and contributes 100 / 50 / 0 points. The score is the weighted
// mean over the metrics that have been sampled so far.

use serde::{Deserialize, Serialize};

use crate::metrics::{MetricKey, PerformanceMetrics};

/// Score reported before any scored metric has been sampled
pub const SCORE_WITHOUT_DATA: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn points(self) -> f64 {
        match self {
            Rating::Good => 100.0,
            Rating::NeedsImprovement => 50.0,
            Rating::Poor => 0.0,
        }
    }
}

/// Rating boundaries and weight for one metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreThreshold {
    pub metric: MetricKey,
    pub good: f64,
    pub needs_improvement: f64,
    pub weight: f64,
}

impl ScoreThreshold {
    pub fn rate(&self, value: f64) -> Rating {
        if value <= self.good {
            Rating::Good
        } else if value <= self.needs_improvement {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }
}

pub const SCORE_THRESHOLDS: [ScoreThreshold; 6] = [
    ScoreThreshold { metric: MetricKey::Lcp, good: 2500.0, needs_improvement: 4000.0, weight: 25.0 },
    ScoreThreshold { metric: MetricKey::Inp, good: 200.0, needs_improvement: 500.0, weight: 30.0 },
    ScoreThreshold { metric: MetricKey::Cls, good: 0.1, needs_improvement: 0.25, weight: 25.0 },
    ScoreThreshold { metric: MetricKey::Fcp, good: 1800.0, needs_improvement: 3000.0, weight: 10.0 },
    ScoreThreshold { metric: MetricKey::Ttfb, good: 800.0, needs_improvement: 1800.0, weight: 10.0 },
    // FID only counts while INP is unknown; see `effective_weight`.
    ScoreThreshold { metric: MetricKey::Fid, good: 100.0, needs_improvement: 300.0, weight: 30.0 },
];

pub fn threshold_for(metric: MetricKey) -> Option<&'static ScoreThreshold> {
    SCORE_THRESHOLDS.iter().find(|t| t.metric == metric)
}

/// Rate a single metric value, if the metric is scored
pub fn rate(metric: MetricKey, value: f64) -> Option<Rating> {
    threshold_for(metric).map(|t| t.rate(value))
}

fn effective_weight(threshold: &ScoreThreshold, metrics: &PerformanceMetrics) -> f64 {
    if threshold.metric == MetricKey::Fid && metrics.inp.is_some() {
        0.0
    } else {
        threshold.weight
    }
}

/// Weighted mean of the available sub-scores, rounded to 0..=100.
pub fn compute_score(metrics: &PerformanceMetrics) -> u8 {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for threshold in SCORE_THRESHOLDS.iter() {
        let Some(value) = metrics.get(threshold.metric) else {
            continue;
        };
        let weight = effective_weight(threshold, metrics);
        if weight <= 0.0 {
            continue;
        }
        weighted += threshold.rate(value).points() * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return SCORE_WITHOUT_DATA;
    }
    (weighted / total_weight).round().clamp(0.0, 100.0) as u8
}
