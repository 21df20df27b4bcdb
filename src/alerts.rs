// Alert records, severity classification and the bounded alert history.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::MonitorError;
use crate::metrics::MetricKey;

/// Default number of alerts kept in history
pub const ALERT_HISTORY_SIZE: usize = 50;

/// Ordered alert urgency: `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Classify a budget overrun given as a percentage of the allocation.
    pub fn from_budget_percentage(percentage: f64) -> Severity {
        if percentage > 150.0 {
            Severity::Critical
        } else if percentage > 120.0 {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Whether an alert of this severity passes a notification threshold
    pub fn meets(self, threshold: Severity) -> bool {
        self >= threshold
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(MonitorError::InvalidConfig(format!(
                "unknown severity `{}`",
                other
            ))),
        }
    }
}

/// Rule that produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    BudgetExceeded,
    ScoreDegraded,
    SlowRender,
}

/// Emitted once per newly exceeded budget, before it becomes an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetExceededEvent {
    pub budget: MetricKey,
    pub actual: f64,
    pub allocated: f64,
    pub percentage: f64,
}

impl BudgetExceededEvent {
    pub fn new(budget: MetricKey, actual: f64, allocated: f64) -> Self {
        BudgetExceededEvent {
            budget,
            actual,
            allocated,
            percentage: actual / allocated * 100.0,
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::from_budget_percentage(self.percentage)
    }
}

/// Immutable alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: f64,
    pub message: String,
    pub action_required: Vec<String>,
}

impl PerformanceAlert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        metric: impl Into<String>,
        value: f64,
        threshold: f64,
        timestamp: f64,
        message: impl Into<String>,
        action_required: Vec<String>,
    ) -> Self {
        PerformanceAlert {
            id: Uuid::new_v4().to_string(),
            alert_type,
            severity,
            metric: metric.into(),
            value,
            threshold,
            timestamp,
            message: message.into(),
            action_required,
        }
    }

    /// Build the single alert a budget event maps to.
    pub fn from_budget_event(event: &BudgetExceededEvent, timestamp: f64) -> Self {
        let key = event.budget;
        let message = format!(
            "{} budget exceeded: {} against {} allocated ({:.0}%)",
            key.label(),
            key.format_value(event.actual),
            key.format_value(event.allocated),
            event.percentage
        );
        PerformanceAlert::new(
            AlertType::BudgetExceeded,
            event.severity(),
            key.as_str(),
            event.actual,
            event.allocated,
            timestamp,
            message,
            remediation_for(key),
        )
    }
}

/// Ordered remediation steps for a metric over budget
pub fn remediation_for(key: MetricKey) -> Vec<String> {
    let steps: &[&str] = match key {
        MetricKey::Lcp => &[
            "Preload the hero image or largest above-the-fold element",
            "Reduce server response time for the document",
            "Remove render-blocking scripts and stylesheets",
        ],
        MetricKey::Fcp => &[
            "Inline critical CSS",
            "Defer non-critical JavaScript",
        ],
        MetricKey::Cls => &[
            "Set explicit width and height on images and embeds",
            "Reserve space for late-loading content",
            "Avoid inserting content above existing content",
        ],
        MetricKey::Inp | MetricKey::Fid => &[
            "Break up long tasks on the main thread",
            "Move heavy work off input handlers",
            "Throttle high-frequency event handlers",
        ],
        MetricKey::Ttfb | MetricKey::DomInteractive => &[
            "Cache the document at the edge",
            "Reduce backend processing before the first byte",
        ],
        MetricKey::ArtworkListLoadTime => &[
            "Paginate or virtualize the gallery grid",
            "Serve thumbnails instead of full-size images",
        ],
        MetricKey::ArtworkModalOpenTime => &[
            "Prefetch artwork details on hover",
            "Render the modal shell before details arrive",
        ],
        MetricKey::SearchResponseTime | MetricKey::FilterResponseTime => &[
            "Debounce query input",
            "Cache recent query results",
            "Index the searched fields",
        ],
        MetricKey::ImageLoadingTime => &[
            "Serve responsive image sizes",
            "Use modern formats such as AVIF or WebP",
            "Lazy-load offscreen images",
        ],
        MetricKey::ScrollFrameTime => &[
            "Throttle scroll handlers to animation frames",
            "Avoid layout reads inside scroll handlers",
        ],
        _ => &["Investigate the regression in the performance dashboard"],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// FIFO ring of the most recent alerts
#[derive(Debug, Clone)]
pub struct AlertHistory {
    alerts: VecDeque<PerformanceAlert>,
    capacity: usize,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        AlertHistory {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, alert: PerformanceAlert) {
        if self.alerts.len() >= self.capacity {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerformanceAlert> {
        self.alerts.iter()
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<PerformanceAlert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}

impl Default for AlertHistory {
    fn default() -> Self {
        AlertHistory::new(ALERT_HISTORY_SIZE)
    }
}
