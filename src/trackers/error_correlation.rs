// Error correlation: ties a caught error to the performance state at the time
// it happened. Best effort, never fails.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::metrics::{MetricKey, PerformanceMetrics};
use crate::scoring::{self, Rating};

pub const CORRELATION_HISTORY_SIZE: usize = 50;

lazy_static! {
    static ref RESOURCE_PRESSURE: Regex =
        Regex::new(r"(?i)time(d)?\s?out|out of memory|quota|chunk\s?load|loading chunk").unwrap();
}

/// A caught error as the host describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedError {
    pub kind: String,
    pub message: String,
}

impl ObservedError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ObservedError {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn from_error(error: &dyn std::error::Error) -> Self {
        ObservedError::new("Error", error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedMetric {
    pub metric: MetricKey,
    pub value: f64,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCorrelation {
    pub error_message: String,
    pub error_kind: String,
    pub timestamp: f64,
    pub score: u8,
    pub degraded_metrics: Vec<DegradedMetric>,
    pub performance_related: bool,
    pub summary: String,
}

/// Correlate one error with a metrics snapshot.
pub fn analyze_error_correlation(
    error: &ObservedError,
    metrics: &PerformanceMetrics,
    timestamp: f64,
) -> ErrorCorrelation {
    let degraded_metrics: Vec<DegradedMetric> = scoring::SCORE_THRESHOLDS
        .iter()
        .filter_map(|threshold| {
            let value = metrics.get(threshold.metric)?;
            let rating = threshold.rate(value);
            (rating != Rating::Good).then_some(DegradedMetric {
                metric: threshold.metric,
                value,
                rating,
            })
        })
        .collect();

    let any_poor = degraded_metrics.iter().any(|m| m.rating == Rating::Poor);
    let pressure = RESOURCE_PRESSURE.is_match(&error.message) || RESOURCE_PRESSURE.is_match(&error.kind);

    let summary = if metrics.is_empty() {
        "error occurred before any performance data was collected".to_string()
    } else if degraded_metrics.is_empty() {
        "error occurred while all scored metrics were within good thresholds".to_string()
    } else {
        let parts: Vec<String> = degraded_metrics
            .iter()
            .map(|m| format!("{} was degraded ({})", m.metric.label(), m.metric.format_value(m.value)))
            .collect();
        format!("error occurred while {}", parts.join(", "))
    };

    ErrorCorrelation {
        error_message: error.message.clone(),
        error_kind: error.kind.clone(),
        timestamp,
        score: scoring::compute_score(metrics),
        performance_related: any_poor || (pressure && !degraded_metrics.is_empty()),
        degraded_metrics,
        summary,
    }
}

/// Keeps the most recent correlations
pub struct ErrorCorrelationAnalyzer {
    clock: Rc<dyn Clock>,
    history: RefCell<VecDeque<ErrorCorrelation>>,
    capacity: usize,
}

impl ErrorCorrelationAnalyzer {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        ErrorCorrelationAnalyzer::with_capacity(clock, CORRELATION_HISTORY_SIZE)
    }

    pub fn with_capacity(clock: Rc<dyn Clock>, capacity: usize) -> Self {
        ErrorCorrelationAnalyzer {
            clock,
            history: RefCell::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn analyze(&self, error: &ObservedError, metrics: &PerformanceMetrics) -> ErrorCorrelation {
        let correlation = analyze_error_correlation(error, metrics, self.clock.now_ms());
        if correlation.performance_related {
            log::warn!("{}: {}", error.kind, correlation.summary);
        } else {
            log::debug!("{}: {}", error.kind, correlation.summary);
        }

        let mut history = self.history.borrow_mut();
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(correlation.clone());
        correlation
    }

    /// Oldest first
    pub fn history(&self) -> Vec<ErrorCorrelation> {
        self.history.borrow().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }
}
