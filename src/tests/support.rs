// Shared fixtures: recording listeners, a fake page and manually driven engines

use std::cell::RefCell;
use std::rc::Rc;

use crate::alerts::{BudgetExceededEvent, PerformanceAlert};
use crate::clock::ManualClock;
use crate::config::MonitorConfig;
use crate::engine::{EngineContext, PerformanceEngine};
use crate::environment::{ConnectionInfo, Environment, HeadlessEnvironment, Viewport};
use crate::metrics::PerformanceMetrics;
use crate::performance_monitor::{HookResult, MonitorListener, MonitorOptions, PerformanceMonitor};
use crate::scheduler::ManualScheduler;

pub const T0: f64 = 1_700_000_000_000.0;

/// Keeps every notification, plus a flat event log to check ordering
#[derive(Default)]
pub struct RecordingListener {
    pub events: RefCell<Vec<String>>,
    pub metrics: RefCell<Vec<PerformanceMetrics>>,
    pub budgets: RefCell<Vec<BudgetExceededEvent>>,
    pub alerts: RefCell<Vec<PerformanceAlert>>,
}

impl RecordingListener {
    pub fn new() -> Rc<Self> {
        Rc::new(RecordingListener::default())
    }

    pub fn event_log(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.borrow().len()
    }

    pub fn update_count(&self) -> usize {
        self.metrics.borrow().len()
    }
}

impl MonitorListener for RecordingListener {
    fn on_metrics_update(&self, metrics: &PerformanceMetrics) -> HookResult {
        self.events.borrow_mut().push("metrics".to_string());
        self.metrics.borrow_mut().push(metrics.clone());
        Ok(())
    }

    fn on_budget_exceeded(&self, event: &BudgetExceededEvent) -> HookResult {
        self.events.borrow_mut().push(format!("budget:{}", event.budget));
        self.budgets.borrow_mut().push(event.clone());
        Ok(())
    }

    fn on_performance_alert(&self, alert: &PerformanceAlert) -> HookResult {
        self.events.borrow_mut().push(format!("alert:{}", alert.metric));
        self.alerts.borrow_mut().push(alert.clone());
        Ok(())
    }
}

/// Fails every callback with an error
pub struct FailingListener;

impl MonitorListener for FailingListener {
    fn on_metrics_update(&self, _metrics: &PerformanceMetrics) -> HookResult {
        Err("metrics sink offline".into())
    }

    fn on_budget_exceeded(&self, _event: &BudgetExceededEvent) -> HookResult {
        Err("budget sink offline".into())
    }

    fn on_performance_alert(&self, _alert: &PerformanceAlert) -> HookResult {
        Err("alert sink offline".into())
    }
}

/// Panics inside every callback
pub struct PanickingListener;

impl MonitorListener for PanickingListener {
    fn on_metrics_update(&self, _metrics: &PerformanceMetrics) -> HookResult {
        panic!("listener exploded on metrics");
    }

    fn on_performance_alert(&self, _alert: &PerformanceAlert) -> HookResult {
        panic!("listener exploded on alert");
    }
}

/// A page with a window, a 390px wide viewport and a 4g connection
#[derive(Debug, Clone, Copy, Default)]
pub struct FakePage;

impl Environment for FakePage {
    fn is_interactive(&self) -> bool {
        true
    }

    fn viewport(&self) -> Option<Viewport> {
        Some(Viewport {
            width: 390,
            height: 844,
        })
    }

    fn device_pixel_ratio(&self) -> Option<f64> {
        Some(3.0)
    }

    fn user_agent(&self) -> Option<String> {
        Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".to_string())
    }

    fn language(&self) -> Option<String> {
        Some("en-US".to_string())
    }

    fn page_url(&self) -> Option<String> {
        Some("https://gallery.example/collections/modern".to_string())
    }

    fn device_memory(&self) -> Option<f64> {
        Some(4.0)
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        Some(6)
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        Some(ConnectionInfo {
            connection_type: Some("cellular".to_string()),
            effective_type: Some("4g".to_string()),
            downlink: Some(9.5),
            rtt: Some(75.0),
        })
    }
}

pub fn manual_monitor(options: MonitorOptions) -> (PerformanceMonitor, ManualClock) {
    let clock = ManualClock::new(T0);
    let monitor = PerformanceMonitor::new(
        options,
        Rc::new(clock.clone()),
        Rc::new(HeadlessEnvironment),
    );
    (monitor, clock)
}

pub fn manual_context(environment: Rc<dyn Environment>) -> (EngineContext, ManualScheduler) {
    let clock = ManualClock::new(T0);
    let scheduler = ManualScheduler::new(clock.clone());
    let context = EngineContext::new(
        Rc::new(clock),
        Rc::new(scheduler.clone()),
        environment,
    )
    .without_default_sources();
    (context, scheduler)
}

/// Engine without browser sources, driven by a manual scheduler
pub fn manual_engine(config: MonitorConfig) -> (PerformanceEngine, ManualScheduler) {
    let (context, scheduler) = manual_context(Rc::new(HeadlessEnvironment));
    let engine = PerformanceEngine::new(config, context).unwrap();
    (engine, scheduler)
}
