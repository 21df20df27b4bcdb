// Exportable performance report.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::alerts::PerformanceAlert;
use crate::environment::RumData;
use crate::error::Result;
use crate::metrics::PerformanceMetrics;
use crate::throttle::ThrottleStats;

include!(concat!(env!("OUT_DIR"), "/version.rs"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// RFC 3339, UTC
    pub generated_at: String,
    pub engine_version: String,
    pub score: u8,
    pub metrics: PerformanceMetrics,
    pub alerts: Vec<PerformanceAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rum: Option<RumData>,
    pub throttle: BTreeMap<String, ThrottleStats>,
}

/// Format epoch milliseconds as RFC 3339. Out-of-range input maps to the epoch.
pub fn rfc3339_from_millis(epoch_ms: f64) -> String {
    let millis = if epoch_ms.is_finite() { epoch_ms as i64 } else { 0 };
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl PerformanceReport {
    pub fn new(
        generated_at_ms: f64,
        score: u8,
        metrics: PerformanceMetrics,
        alerts: Vec<PerformanceAlert>,
        rum: Option<RumData>,
        throttle: BTreeMap<String, ThrottleStats>,
    ) -> Self {
        PerformanceReport {
            generated_at: rfc3339_from_millis(generated_at_ms),
            engine_version: ENGINE_VERSION.to_string(),
            score,
            metrics,
            alerts,
            rum,
            throttle,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_pretty()?)?;
        log::info!("Performance report written to {}", path.display());
        Ok(())
    }
}
