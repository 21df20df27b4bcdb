// Performance telemetry and alerting engine for single-page web apps.
//
// Samples page-load timings, interaction latency, layout shift, network and
// device signals, scores them, checks them against budgets and fans alerts
// and reports out to any number of subscribers. Compiles to wasm32 for the
// browser; on other targets the browser sources report themselves
// unavailable and samples are pushed by the host.

pub mod alerts;
pub mod budget;
pub mod clock;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod error_traits;
pub mod hub;
pub mod metrics;
pub mod performance_monitor;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod throttle;
pub mod trackers;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

#[cfg(test)]
mod tests;

pub use alerts::{AlertType, BudgetExceededEvent, PerformanceAlert, Severity};
pub use budget::{BudgetSet, RearmPolicy};
pub use config::MonitorConfig;
pub use engine::{EngineContext, PerformanceEngine, RefreshHandle, Subscription};
pub use error::{MonitorError, Result};
pub use metrics::{MetricKey, MetricSample, PerformanceMetrics};
pub use performance_monitor::{
    AdvancedReport, MonitorHooks, MonitorListener, MonitorOptions, PerformanceMonitor,
};
pub use report::PerformanceReport;
