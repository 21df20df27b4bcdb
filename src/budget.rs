// Declared performance budgets and edge-triggered evaluation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::alerts::BudgetExceededEvent;
use crate::error::{MonitorError, Result};
use crate::metrics::{MetricKey, PerformanceMetrics};

/// When a budget that already alerted may alert again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    /// One alert per metric/threshold pair until `reset`.
    #[default]
    OncePerSession,
    /// Re-arm once the metric is back within budget.
    OnRecovery,
}

/// Allocated maximum per metric
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BudgetSet {
    budgets: BTreeMap<MetricKey, f64>,
}

impl BudgetSet {
    pub fn empty() -> Self {
        BudgetSet::default()
    }

    /// Web-vitals "good" boundaries plus gallery interaction budgets
    pub fn recommended() -> Self {
        let mut budgets = BTreeMap::new();
        budgets.insert(MetricKey::Lcp, 2500.0);
        budgets.insert(MetricKey::Fcp, 1800.0);
        budgets.insert(MetricKey::Cls, 0.1);
        budgets.insert(MetricKey::Inp, 200.0);
        budgets.insert(MetricKey::Fid, 100.0);
        budgets.insert(MetricKey::Ttfb, 800.0);
        budgets.insert(MetricKey::ArtworkListLoadTime, 2000.0);
        budgets.insert(MetricKey::ArtworkModalOpenTime, 500.0);
        budgets.insert(MetricKey::SearchResponseTime, 500.0);
        budgets.insert(MetricKey::FilterResponseTime, 300.0);
        budgets.insert(MetricKey::ImageLoadingTime, 1000.0);
        budgets.insert(MetricKey::ScrollFrameTime, 16.7);
        BudgetSet { budgets }
    }

    pub fn set(&mut self, metric: MetricKey, allocated: f64) -> Result<()> {
        if !metric.is_numeric() {
            return Err(MonitorError::InvalidConfig(format!(
                "{} cannot carry a budget",
                metric
            )));
        }
        if !allocated.is_finite() || allocated <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "budget for {} must be positive (got {})",
                metric, allocated
            )));
        }
        self.budgets.insert(metric, allocated);
        Ok(())
    }

    pub fn with(mut self, metric: MetricKey, allocated: f64) -> Result<Self> {
        self.set(metric, allocated)?;
        Ok(self)
    }

    pub fn remove(&mut self, metric: MetricKey) -> Option<f64> {
        self.budgets.remove(&metric)
    }

    pub fn get(&self, metric: MetricKey) -> Option<f64> {
        self.budgets.get(&metric).copied()
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        self.budgets.iter().map(|(k, v)| (*k, *v))
    }
}

/// Compares metrics against budgets and remembers which ones already fired.
#[derive(Debug, Clone)]
pub struct BudgetEvaluator {
    budgets: BudgetSet,
    policy: RearmPolicy,
    // (metric, threshold bits)
    alerted: HashSet<(MetricKey, u64)>,
}

impl BudgetEvaluator {
    pub fn new(budgets: BudgetSet, policy: RearmPolicy) -> Self {
        BudgetEvaluator {
            budgets,
            policy,
            alerted: HashSet::new(),
        }
    }

    pub fn budgets(&self) -> &BudgetSet {
        &self.budgets
    }

    pub fn set_budget(&mut self, metric: MetricKey, allocated: f64) -> Result<()> {
        self.budgets.set(metric, allocated)
    }

    pub fn remove_budget(&mut self, metric: MetricKey) -> Option<f64> {
        self.budgets.remove(metric)
    }

    /// Check every declared budget and return one event per budget that is
    /// newly exceeded. A budget that already fired stays silent while it
    /// remains over, and (with `OnRecovery`) re-arms once it is back within.
    pub fn evaluate(&mut self, metrics: &PerformanceMetrics) -> Vec<BudgetExceededEvent> {
        let mut events = Vec::new();

        for (metric, allocated) in self.budgets.iter() {
            let Some(actual) = metrics.get(metric) else {
                continue;
            };
            let pair = (metric, allocated.to_bits());

            if actual > allocated {
                if self.alerted.insert(pair) {
                    events.push(BudgetExceededEvent::new(metric, actual, allocated));
                }
            } else if self.policy == RearmPolicy::OnRecovery {
                self.alerted.remove(&pair);
            }
        }

        events
    }

    pub fn has_alerted(&self, metric: MetricKey) -> bool {
        self.alerted.iter().any(|(key, _)| *key == metric)
    }

    /// Forget which budgets fired; the next crossing alerts again.
    pub fn reset(&mut self) {
        self.alerted.clear();
    }
}
