// Engine configuration. Every key is optional; JSON and TOML use the same
// camelCase names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::alerts::{Severity, ALERT_HISTORY_SIZE};
use crate::budget::{BudgetSet, RearmPolicy};
use crate::error::{MonitorError, Result};
use crate::metrics::MetricKey;
use crate::performance_monitor::{MonitorOptions, FRAME_BUDGET_MS, SCORE_ALERT_THRESHOLD};
use crate::trackers::gallery::JOURNEY_CAPACITY;

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Lowest severity delivered to subscribers. History keeps everything.
    pub alert_threshold: Severity,
    /// Report refresh cadence in milliseconds
    pub update_interval: u64,
    pub enable_gallery_tracking: bool,
    pub enable_error_correlation: bool,
    pub enable_bundle_analysis: bool,
    /// Start from the recommended budget table before applying `budgets`
    pub use_recommended_budgets: bool,
    /// Per-metric overrides, merged over the recommended table
    pub budgets: BTreeMap<MetricKey, f64>,
    pub alert_history_capacity: usize,
    pub journey_capacity: usize,
    pub budget_rearm: RearmPolicy,
    pub score_alert_threshold: u8,
    pub frame_budget_ms: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            alert_threshold: Severity::Medium,
            update_interval: DEFAULT_UPDATE_INTERVAL_MS,
            enable_gallery_tracking: true,
            enable_error_correlation: true,
            enable_bundle_analysis: true,
            use_recommended_budgets: true,
            budgets: BTreeMap::new(),
            alert_history_capacity: ALERT_HISTORY_SIZE,
            journey_capacity: JOURNEY_CAPACITY,
            budget_rearm: RearmPolicy::OncePerSession,
            score_alert_threshold: SCORE_ALERT_THRESHOLD,
            frame_budget_ms: FRAME_BUDGET_MS,
        }
    }
}

impl MonitorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.toml` or `.json` file; the extension picks the format.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => MonitorConfig::from_toml(&contents),
            Some("json") => MonitorConfig::from_json(&contents),
            other => Err(MonitorError::InvalidConfig(format!(
                "unsupported config format {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval == 0 {
            return Err(MonitorError::InvalidConfig(
                "updateInterval must be greater than 0".to_string(),
            ));
        }
        if self.alert_history_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "alertHistoryCapacity must be greater than 0".to_string(),
            ));
        }
        if self.journey_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "journeyCapacity must be greater than 0".to_string(),
            ));
        }
        if self.score_alert_threshold > 100 {
            return Err(MonitorError::InvalidConfig(format!(
                "scoreAlertThreshold must be within 0..=100 (got {})",
                self.score_alert_threshold
            )));
        }
        if !self.frame_budget_ms.is_finite() || self.frame_budget_ms <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "frameBudgetMs must be a positive number (got {})",
                self.frame_budget_ms
            )));
        }
        self.budget_set().map(|_| ())
    }

    /// Effective budgets: the recommended table (unless disabled) with the
    /// configured overrides applied.
    pub fn budget_set(&self) -> Result<BudgetSet> {
        let mut budgets = if self.use_recommended_budgets {
            BudgetSet::recommended()
        } else {
            BudgetSet::empty()
        };
        for (metric, allocated) in &self.budgets {
            budgets.set(*metric, *allocated)?;
        }
        Ok(budgets)
    }

    pub fn monitor_options(&self) -> Result<MonitorOptions> {
        Ok(MonitorOptions {
            budgets: self.budget_set()?,
            rearm: self.budget_rearm,
            alert_history_capacity: self.alert_history_capacity,
            score_alert_threshold: self.score_alert_threshold,
            frame_budget_ms: self.frame_budget_ms,
        })
    }
}
