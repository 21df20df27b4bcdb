// Metrics aggregator: merges samples from every source into one snapshot,
// scores it, checks budgets and notifies the active listener.
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::alerts::{
    AlertHistory, AlertType, BudgetExceededEvent, PerformanceAlert, Severity, ALERT_HISTORY_SIZE,
};
use crate::budget::{BudgetEvaluator, BudgetSet, RearmPolicy};
use crate::clock::Clock;
use crate::environment::{self, Environment, RumData};
use crate::error::{MonitorError, Result};
use crate::metrics::{MetricKey, MetricSample, PerformanceMetrics};
use crate::scoring;
use crate::sources::{self, SampleSink, SampleSource};

/// Frame budget for consumer render self-monitoring
pub const FRAME_BUDGET_MS: f64 = 16.0;

/// Score below which a `score_degraded` alert fires
pub const SCORE_ALERT_THRESHOLD: u8 = 50;

const CRITICAL_SCORE: u8 = 25;

/// Outcome of a listener callback. Errors are logged, never propagated.
pub type HookResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Receiver of aggregator notifications. Every method defaults to a no-op.
pub trait MonitorListener {
    fn on_metrics_update(&self, _metrics: &PerformanceMetrics) -> HookResult {
        Ok(())
    }

    fn on_budget_exceeded(&self, _event: &BudgetExceededEvent) -> HookResult {
        Ok(())
    }

    fn on_performance_alert(&self, _alert: &PerformanceAlert) -> HookResult {
        Ok(())
    }
}

type Hook<T> = Option<Box<dyn Fn(&T) -> HookResult>>;

/// Closure-based listener
#[derive(Default)]
pub struct MonitorHooks {
    metrics: Hook<PerformanceMetrics>,
    budget: Hook<BudgetExceededEvent>,
    alert: Hook<PerformanceAlert>,
}

impl MonitorHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_metrics(mut self, f: impl Fn(&PerformanceMetrics) -> HookResult + 'static) -> Self {
        self.metrics = Some(Box::new(f));
        self
    }

    pub fn on_budget(mut self, f: impl Fn(&BudgetExceededEvent) -> HookResult + 'static) -> Self {
        self.budget = Some(Box::new(f));
        self
    }

    pub fn on_alert(mut self, f: impl Fn(&PerformanceAlert) -> HookResult + 'static) -> Self {
        self.alert = Some(Box::new(f));
        self
    }
}

impl MonitorListener for MonitorHooks {
    fn on_metrics_update(&self, metrics: &PerformanceMetrics) -> HookResult {
        self.metrics.as_ref().map_or(Ok(()), |f| f(metrics))
    }

    fn on_budget_exceeded(&self, event: &BudgetExceededEvent) -> HookResult {
        self.budget.as_ref().map_or(Ok(()), |f| f(event))
    }

    fn on_performance_alert(&self, alert: &PerformanceAlert) -> HookResult {
        self.alert.as_ref().map_or(Ok(()), |f| f(alert))
    }
}

/// Tunables for one aggregator
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub budgets: BudgetSet,
    pub rearm: RearmPolicy,
    pub alert_history_capacity: usize,
    pub score_alert_threshold: u8,
    pub frame_budget_ms: f64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions {
            budgets: BudgetSet::recommended(),
            rearm: RearmPolicy::default(),
            alert_history_capacity: ALERT_HISTORY_SIZE,
            score_alert_threshold: SCORE_ALERT_THRESHOLD,
            frame_budget_ms: FRAME_BUDGET_MS,
        }
    }
}

/// Pull view of the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedReport {
    pub metrics: PerformanceMetrics,
    pub score: u8,
    pub alerts: Vec<PerformanceAlert>,
}

struct MonitorState {
    metrics: PerformanceMetrics,
    budgets: BudgetEvaluator,
    alerts: AlertHistory,
    score_alerted: bool,
    slow_components: HashSet<String>,
}

/// What a single `record` produced, delivered after the state borrow ends
struct Notification {
    metrics: PerformanceMetrics,
    budget_alerts: Vec<(BudgetExceededEvent, PerformanceAlert)>,
    score_alert: Option<PerformanceAlert>,
}

struct MonitorInner {
    state: RefCell<MonitorState>,
    sources: RefCell<Vec<Box<dyn SampleSource>>>,
    listener: RefCell<Option<Rc<dyn MonitorListener>>>,
    // Bumped on every start and stop; sinks from older generations go quiet.
    generation: Cell<u64>,
    monitoring: Cell<bool>,
    score_alert_threshold: u8,
    frame_budget_ms: f64,
    clock: Rc<dyn Clock>,
    environment: Rc<dyn Environment>,
}

/// Shared handle to one aggregator. Clones refer to the same metrics.
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Rc<MonitorInner>,
}

impl PerformanceMonitor {
    pub fn new(
        options: MonitorOptions,
        clock: Rc<dyn Clock>,
        environment: Rc<dyn Environment>,
    ) -> Self {
        PerformanceMonitor {
            inner: Rc::new(MonitorInner {
                state: RefCell::new(MonitorState {
                    metrics: PerformanceMetrics::new(),
                    budgets: BudgetEvaluator::new(options.budgets, options.rearm),
                    alerts: AlertHistory::new(options.alert_history_capacity),
                    score_alerted: false,
                    slow_components: HashSet::new(),
                }),
                sources: RefCell::new(Vec::new()),
                listener: RefCell::new(None),
                generation: Cell::new(0),
                monitoring: Cell::new(false),
                score_alert_threshold: options.score_alert_threshold,
                frame_budget_ms: options.frame_budget_ms,
                clock,
                environment,
            }),
        }
    }

    /// Register a source. Sources added while monitoring attach on the next start.
    pub fn add_source(&self, source: Box<dyn SampleSource>) {
        self.inner.sources.borrow_mut().push(source);
    }

    /// Register every browser-backed source for this monitor's environment.
    pub fn add_default_sources(&self) {
        for source in sources::default_sources(self.inner.environment.clone()) {
            self.add_source(source);
        }
    }

    pub fn source_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring.get()
    }

    /// Attach every source and deliver to `listener` from now on.
    ///
    /// Calling again while monitoring only swaps the listener. A required
    /// source that fails to attach rolls back the sources already attached.
    pub fn start_monitoring(&self, listener: Rc<dyn MonitorListener>) -> Result<()> {
        *self.inner.listener.borrow_mut() = Some(listener);
        if self.inner.monitoring.get() {
            log::debug!("Monitoring already active, listener replaced");
            return Ok(());
        }

        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        self.inner.monitoring.set(true);

        // Attach outside the borrow: sources may deliver synchronously and a
        // listener may call back into the monitor.
        let mut sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        let mut failure = None;
        let mut attached = 0;

        for source in sources.iter_mut() {
            match source.attach(self.sink(generation)) {
                Ok(()) => {
                    attached += 1;
                    log::debug!("Attached source {}", source.name());
                }
                Err(e) if source.required() => {
                    failure = Some(e);
                    break;
                }
                Err(MonitorError::SourceUnavailable { source_name }) => {
                    log::info!("Source {} unavailable, its metrics stay unset", source_name);
                }
                Err(e) => log::warn!("Skipping source {}: {}", source.name(), e),
            }
        }

        let stopped_meanwhile = self.inner.generation.get() != generation;
        if failure.is_some() || stopped_meanwhile {
            for source in sources.iter_mut() {
                source.detach();
            }
        }
        self.restore_sources(sources);

        if let Some(e) = failure {
            self.inner.generation.set(self.inner.generation.get() + 1);
            self.inner.monitoring.set(false);
            self.inner.listener.borrow_mut().take();
            log::error!("Failed to start monitoring: {}", e);
            return Err(e);
        }
        if stopped_meanwhile {
            log::debug!("Monitoring stopped while sources were attaching");
            return Ok(());
        }

        log::info!("Performance monitoring started with {} source(s)", attached);
        Ok(())
    }

    /// Detach every source. Nothing is delivered after this returns.
    pub fn stop_monitoring(&self) {
        if !self.inner.monitoring.get() {
            return;
        }
        self.inner.generation.set(self.inner.generation.get() + 1);
        self.inner.monitoring.set(false);
        self.inner.listener.borrow_mut().take();

        // Empty while `start_monitoring` is mid-attach; it detaches on return.
        let mut sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        for source in sources.iter_mut() {
            source.detach();
        }
        self.restore_sources(sources);
        log::info!("Performance monitoring stopped");
    }

    fn restore_sources(&self, mut sources: Vec<Box<dyn SampleSource>>) {
        let mut slot = self.inner.sources.borrow_mut();
        // Keep anything registered while the list was taken out.
        sources.append(&mut slot);
        *slot = sources;
    }

    fn sink(&self, generation: u64) -> SampleSink {
        let weak: Weak<MonitorInner> = Rc::downgrade(&self.inner);
        SampleSink::new(move |sample| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.generation.get() != generation || !inner.monitoring.get() {
                return;
            }
            PerformanceMonitor { inner }.record(sample);
        })
    }

    /// Merge one sample, then score, check budgets and notify.
    pub fn record(&self, sample: MetricSample) {
        let notification = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            if state.metrics.merge(sample).is_none() {
                return;
            }

            let now = self.inner.clock.now_ms();
            let events = state.budgets.evaluate(&state.metrics);
            let mut budget_alerts = Vec::with_capacity(events.len());
            for event in events {
                let alert = PerformanceAlert::from_budget_event(&event, now);
                log::warn!("{}", alert.message);
                state.alerts.push(alert.clone());
                budget_alerts.push((event, alert));
            }

            let score_alert = self.check_score(state, now);
            if let Some(alert) = &score_alert {
                state.alerts.push(alert.clone());
            }

            Notification {
                metrics: state.metrics.clone(),
                budget_alerts,
                score_alert,
            }
        };

        let Some(listener) = self.listener() else {
            return;
        };
        report_hook("metrics update", listener.on_metrics_update(&notification.metrics));
        for (event, alert) in &notification.budget_alerts {
            report_hook("budget event", listener.on_budget_exceeded(event));
            report_hook("alert", listener.on_performance_alert(alert));
        }
        if let Some(alert) = &notification.score_alert {
            report_hook("alert", listener.on_performance_alert(alert));
        }
    }

    /// Edge-triggered: one alert when the score drops under the threshold,
    /// re-armed once it climbs back.
    fn check_score(&self, state: &mut MonitorState, now: f64) -> Option<PerformanceAlert> {
        let threshold = self.inner.score_alert_threshold;
        let score = scoring::compute_score(&state.metrics);

        if score >= threshold {
            state.score_alerted = false;
            return None;
        }
        if state.score_alerted {
            return None;
        }
        state.score_alerted = true;

        let severity = if score < CRITICAL_SCORE {
            Severity::Critical
        } else {
            Severity::High
        };
        let degraded: Vec<&str> = scoring::SCORE_THRESHOLDS
            .iter()
            .filter(|t| {
                state
                    .metrics
                    .get(t.metric)
                    .map_or(false, |v| t.rate(v) != scoring::Rating::Good)
            })
            .map(|t| t.metric.label())
            .collect();

        Some(PerformanceAlert::new(
            AlertType::ScoreDegraded,
            severity,
            "score",
            score as f64,
            threshold as f64,
            now,
            format!("Performance score dropped to {} (below {})", score, threshold),
            degraded
                .iter()
                .map(|label| format!("Improve {}", label))
                .collect(),
        ))
    }

    /// Report how long a consumer component took to render. Above the frame
    /// budget one `slow_render` alert fires per component until it renders
    /// within budget again.
    pub fn record_render_time(&self, component: &str, render_ms: f64) -> Option<PerformanceAlert> {
        if !render_ms.is_finite() || render_ms < 0.0 {
            log::warn!("Ignoring render time {} for {}", render_ms, component);
            return None;
        }
        let budget = self.inner.frame_budget_ms;

        let alert = {
            let mut state = self.inner.state.borrow_mut();
            if render_ms <= budget {
                state.slow_components.remove(component);
                return None;
            }
            if !state.slow_components.insert(component.to_string()) {
                return None;
            }

            let severity = if render_ms > budget * 3.0 {
                Severity::High
            } else {
                Severity::Low
            };
            let alert = PerformanceAlert::new(
                AlertType::SlowRender,
                severity,
                component,
                render_ms,
                budget,
                self.inner.clock.now_ms(),
                format!(
                    "{} took {:.1}ms to render, over the {:.0}ms frame budget",
                    component, render_ms, budget
                ),
                vec![
                    "Memoize expensive derived data".to_string(),
                    "Split the component so updates touch less of the tree".to_string(),
                ],
            );
            state.alerts.push(alert.clone());
            alert
        };

        if let Some(listener) = self.listener() {
            report_hook("alert", listener.on_performance_alert(&alert));
        }
        Some(alert)
    }

    fn listener(&self) -> Option<Rc<dyn MonitorListener>> {
        self.inner.listener.borrow().clone()
    }

    pub fn performance_score(&self) -> u8 {
        scoring::compute_score(&self.inner.state.borrow().metrics)
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.inner.state.borrow().metrics.clone()
    }

    /// Alert history, oldest first
    pub fn alerts(&self) -> Vec<PerformanceAlert> {
        self.inner.state.borrow().alerts.to_vec()
    }

    pub fn advanced_report(&self) -> AdvancedReport {
        let state = self.inner.state.borrow();
        AdvancedReport {
            score: scoring::compute_score(&state.metrics),
            metrics: state.metrics.clone(),
            alerts: state.alerts.to_vec(),
        }
    }

    pub fn collect_rum_data(&self) -> Result<RumData> {
        environment::collect_rum_data(self.inner.environment.as_ref(), self.inner.clock.as_ref())
    }

    pub fn budgets(&self) -> BudgetSet {
        self.inner.state.borrow().budgets.budgets().clone()
    }

    pub fn set_budget(&self, metric: MetricKey, allocated: f64) -> Result<()> {
        self.inner.state.borrow_mut().budgets.set_budget(metric, allocated)
    }

    pub fn remove_budget(&self, metric: MetricKey) -> Option<f64> {
        self.inner.state.borrow_mut().budgets.remove_budget(metric)
    }

    /// Clear metrics, alert history and every edge-trigger.
    pub fn reset(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.metrics = PerformanceMetrics::new();
        state.alerts.clear();
        state.budgets.reset();
        state.score_alerted = false;
        state.slow_components.clear();
        log::debug!("Performance monitor reset");
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        self.inner.clock.clone()
    }

    pub fn environment(&self) -> Rc<dyn Environment> {
        self.inner.environment.clone()
    }
}

fn report_hook(what: &str, result: HookResult) {
    if let Err(e) = result {
        log::warn!("Listener failed on {}: {}", what, e);
    }
}
