// Engine instance: the aggregator, its subscribers and the domain trackers
// behind one explicitly constructed, explicitly disposed object.
//
// Monitoring is reference counted per subscription: the aggregator starts
// when the first subscription asks for it and stops when the last one lets
// go. Asking twice with the same subscription counts once.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;

use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::environment::{self, Environment, RumData};
use crate::error::{MonitorError, Result};
use crate::hub::{SubscriberHub, SubscriberId};
use crate::metrics::{MetricKey, PerformanceMetrics};
use crate::performance_monitor::{AdvancedReport, MonitorListener, PerformanceMonitor};
use crate::report::PerformanceReport;
use crate::scheduler::{Scheduler, TimerId};
use crate::sources::SampleSource;
use crate::throttle::ThrottleMonitor;
use crate::trackers::{
    BundleAnalytics, BundleAnalyzer, ErrorCorrelation, ErrorCorrelationAnalyzer, GalleryTracker,
    ObservedError,
};

/// Runtime services an engine is built on
#[derive(Clone)]
pub struct EngineContext {
    pub clock: Rc<dyn Clock>,
    pub scheduler: Rc<dyn Scheduler>,
    pub environment: Rc<dyn Environment>,
    pub bundle_analyzer: BundleAnalyzer,
    /// Register the browser-backed sample sources on construction
    pub default_sources: bool,
}

impl EngineContext {
    pub fn new(
        clock: Rc<dyn Clock>,
        scheduler: Rc<dyn Scheduler>,
        environment: Rc<dyn Environment>,
    ) -> Self {
        EngineContext {
            clock,
            scheduler,
            environment,
            bundle_analyzer: BundleAnalyzer::for_platform(),
            default_sources: true,
        }
    }

    /// The current page: system clock, browser timers and environment.
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        EngineContext::new(
            Rc::new(SystemClock),
            Rc::new(crate::scheduler::BrowserScheduler),
            environment::platform_environment(),
        )
    }

    /// System clock and platform environment with a caller-supplied scheduler.
    pub fn with_scheduler(scheduler: Rc<dyn Scheduler>) -> Self {
        EngineContext::new(
            Rc::new(SystemClock),
            scheduler,
            environment::platform_environment(),
        )
    }

    pub fn without_default_sources(mut self) -> Self {
        self.default_sources = false;
        self
    }

    pub fn with_bundle_analyzer(mut self, analyzer: BundleAnalyzer) -> Self {
        self.bundle_analyzer = analyzer;
        self
    }
}

struct RefreshState {
    engine: Weak<EngineInner>,
    callback: Box<dyn Fn(&AdvancedReport)>,
    interval_ms: f64,
    timer: Cell<Option<TimerId>>,
    cancelled: Cell<bool>,
}

/// Repeating report refresh. Cancelled on drop.
pub struct RefreshHandle {
    state: Rc<RefreshState>,
}

impl RefreshHandle {
    pub fn cancel(&self) {
        cancel_refresh(&self.state);
    }

    pub fn is_active(&self) -> bool {
        !self.state.cancelled.get()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        cancel_refresh(&self.state);
    }
}

fn cancel_refresh(state: &RefreshState) {
    state.cancelled.set(true);
    if let (Some(id), Some(engine)) = (state.timer.take(), state.engine.upgrade()) {
        engine.scheduler.cancel(id);
    }
}

fn schedule_refresh(state: &Rc<RefreshState>) {
    let Some(engine) = state.engine.upgrade() else {
        return;
    };
    if state.cancelled.get() {
        return;
    }

    let next = Rc::downgrade(state);
    let id = engine.scheduler.set_timeout(
        state.interval_ms,
        Box::new(move || {
            let Some(state) = next.upgrade() else {
                return;
            };
            state.timer.set(None);
            if state.cancelled.get() {
                return;
            }
            let Some(engine) = state.engine.upgrade() else {
                return;
            };
            let report = engine.monitor.advanced_report();
            drop(engine);
            (state.callback)(&report);
            schedule_refresh(&state);
        }),
    );
    state.timer.set(Some(id));
}

struct EngineInner {
    config: MonitorConfig,
    monitor: PerformanceMonitor,
    hub: Rc<SubscriberHub>,
    monitoring: RefCell<BTreeSet<SubscriberId>>,
    refreshes: RefCell<Vec<Weak<RefreshState>>>,
    scheduler: Rc<dyn Scheduler>,
    gallery: Option<GalleryTracker>,
    errors: Option<ErrorCorrelationAnalyzer>,
    bundles: Option<BundleAnalyzer>,
}

impl EngineInner {
    fn release(&self, id: SubscriberId) {
        let now_idle = {
            let mut monitoring = self.monitoring.borrow_mut();
            monitoring.remove(&id) && monitoring.is_empty()
        };
        if now_idle {
            self.monitor.stop_monitoring();
        }
    }
}

/// Handle for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    engine: Weak<EngineInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.release(self.id);
            engine.hub.unregister(self.id);
        }
    }
}

/// Performance telemetry engine
#[derive(Clone)]
pub struct PerformanceEngine {
    inner: Rc<EngineInner>,
}

impl PerformanceEngine {
    pub fn new(config: MonitorConfig, context: EngineContext) -> Result<Self> {
        config.validate()?;

        let monitor = PerformanceMonitor::new(
            config.monitor_options()?,
            context.clock.clone(),
            context.environment.clone(),
        );
        if context.default_sources {
            monitor.add_default_sources();
        }

        let gallery = config.enable_gallery_tracking.then(|| {
            GalleryTracker::new(
                monitor.clone(),
                context.scheduler.clone(),
                config.journey_capacity,
            )
        });
        let errors = config
            .enable_error_correlation
            .then(|| ErrorCorrelationAnalyzer::new(context.clock.clone()));
        let bundles = config.enable_bundle_analysis.then_some(context.bundle_analyzer);

        log::debug!(
            "Engine created (gallery: {}, errors: {}, bundles: {})",
            gallery.is_some(),
            errors.is_some(),
            bundles.is_some()
        );

        Ok(PerformanceEngine {
            inner: Rc::new(EngineInner {
                hub: Rc::new(SubscriberHub::new(config.alert_threshold)),
                config,
                monitor,
                monitoring: RefCell::new(BTreeSet::new()),
                refreshes: RefCell::new(Vec::new()),
                scheduler: context.scheduler,
                gallery,
                errors,
                bundles,
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// The aggregator, for recording custom samples or adding sources
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.inner.monitor
    }

    pub fn add_source(&self, source: Box<dyn SampleSource>) {
        self.inner.monitor.add_source(source);
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn subscribe(&self, listener: Rc<dyn MonitorListener>) -> Subscription {
        Subscription {
            id: self.inner.hub.register(listener),
            engine: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.len()
    }

    /// Start monitoring on behalf of `subscription`. Sources attach only for
    /// the first active subscription.
    pub fn start_monitoring(&self, subscription: &Subscription) -> Result<()> {
        let id = subscription.id;
        if !Weak::ptr_eq(&subscription.engine, &Rc::downgrade(&self.inner))
            || !self.inner.hub.contains(id)
        {
            return Err(MonitorError::subscriber(id, "not subscribed to this engine"));
        }

        let first = {
            let mut monitoring = self.inner.monitoring.borrow_mut();
            if !monitoring.insert(id) {
                return Ok(());
            }
            monitoring.len() == 1
        };
        if !first {
            return Ok(());
        }

        let hub: Rc<dyn MonitorListener> = self.inner.hub.clone();
        if let Err(e) = self.inner.monitor.start_monitoring(hub) {
            self.inner.monitoring.borrow_mut().remove(&id);
            return Err(e);
        }
        Ok(())
    }

    pub fn stop_monitoring(&self, subscription: &Subscription) {
        self.inner.release(subscription.id);
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.is_monitoring()
    }

    /// Number of subscriptions currently holding monitoring open
    pub fn monitoring_count(&self) -> usize {
        self.inner.monitoring.borrow().len()
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub fn performance_score(&self) -> u8 {
        self.inner.monitor.performance_score()
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.inner.monitor.metrics()
    }

    pub fn advanced_report(&self) -> AdvancedReport {
        self.inner.monitor.advanced_report()
    }

    pub fn collect_rum_data(&self) -> Result<RumData> {
        self.inner.monitor.collect_rum_data()
    }

    pub fn set_budget(&self, metric: MetricKey, allocated: f64) -> Result<()> {
        self.inner.monitor.set_budget(metric, allocated)
    }

    pub fn record_render_time(&self, component: &str, render_ms: f64) {
        self.inner.monitor.record_render_time(component, render_ms);
    }

    /// Call `callback` with a fresh report every `updateInterval` until the
    /// returned handle is cancelled or dropped.
    pub fn start_report_refresh(
        &self,
        callback: impl Fn(&AdvancedReport) + 'static,
    ) -> RefreshHandle {
        let state = Rc::new(RefreshState {
            engine: Rc::downgrade(&self.inner),
            callback: Box::new(callback),
            interval_ms: self.inner.config.update_interval as f64,
            timer: Cell::new(None),
            cancelled: Cell::new(false),
        });
        schedule_refresh(&state);

        let mut refreshes = self.inner.refreshes.borrow_mut();
        refreshes.retain(|weak| weak.strong_count() > 0);
        refreshes.push(Rc::downgrade(&state));
        RefreshHandle { state }
    }

    /// Snapshot for export. RUM data is included when the environment has it.
    pub fn export_report(&self) -> PerformanceReport {
        let report = self.inner.monitor.advanced_report();
        let rum = match self.inner.monitor.collect_rum_data() {
            Ok(rum) => Some(rum),
            Err(e) => {
                log::debug!("Exporting without RUM data: {}", e);
                None
            }
        };
        PerformanceReport::new(
            self.inner.monitor.clock().now_ms(),
            report.score,
            report.metrics,
            report.alerts,
            rum,
            ThrottleMonitor::global().snapshot(),
        )
    }

    // ========================================================================
    // Trackers
    // ========================================================================

    /// `None` when gallery tracking is disabled
    pub fn gallery(&self) -> Option<&GalleryTracker> {
        self.inner.gallery.as_ref()
    }

    /// `None` when error correlation is disabled
    pub fn error_correlation(&self) -> Option<&ErrorCorrelationAnalyzer> {
        self.inner.errors.as_ref()
    }

    /// Correlate `error` with the current metrics.
    pub fn analyze_error(&self, error: &ObservedError) -> Option<ErrorCorrelation> {
        let analyzer = self.inner.errors.as_ref()?;
        Some(analyzer.analyze(error, &self.inner.monitor.metrics()))
    }

    /// `None` when bundle analysis is disabled
    pub fn analyze_bundles(&self) -> Option<LocalBoxFuture<'static, BundleAnalytics>> {
        self.inner.bundles.as_ref().map(BundleAnalyzer::analyze_bundles)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop monitoring, drop every subscriber and cancel every refresh.
    /// Metrics and alert history stay readable.
    pub fn dispose(&self) {
        self.inner.monitoring.borrow_mut().clear();
        self.inner.monitor.stop_monitoring();
        self.inner.hub.clear();

        let refreshes = std::mem::take(&mut *self.inner.refreshes.borrow_mut());
        for state in refreshes.iter().filter_map(Weak::upgrade) {
            cancel_refresh(&state);
        }
        if let Some(gallery) = &self.inner.gallery {
            gallery.cancel_pending();
        }
        log::info!("Performance engine disposed");
    }
}
