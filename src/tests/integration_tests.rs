// Integration tests for complete monitoring workflows

use std::cell::RefCell;
use std::rc::Rc;

use super::support::*;
use crate::alerts::{AlertType, Severity};
use crate::config::MonitorConfig;
use crate::engine::PerformanceEngine;
use crate::metrics::MetricSample;
use crate::performance_monitor::MonitorHooks;
use crate::sources::{InteractionLatencyTracker, LayoutShiftAccumulator, NavigationEntry, PushSource};
use crate::trackers::ObservedError;

#[test]
fn test_page_session_end_to_end() {
    let config = MonitorConfig::from_toml(
        r#"
alertThreshold = "high"
updateInterval = 5000

[budgets]
artworkListLoadTime = 1500
"#,
    )
    .unwrap();
    let (context, scheduler) = manual_context(Rc::new(FakePage));
    let engine = PerformanceEngine::new(config, context).unwrap();

    let (source, page) = PushSource::new("page");
    engine.add_source(Box::new(source.required()));

    let dashboard = RecordingListener::new();
    let pager_alerts = Rc::new(RefCell::new(Vec::new()));
    let pager_sink = pager_alerts.clone();
    let pager = MonitorHooks::new().on_alert(move |alert| {
        pager_sink.borrow_mut().push(alert.severity);
        Ok(())
    });

    let dashboard_sub = engine.subscribe(dashboard.clone());
    let pager_sub = engine.subscribe(Rc::new(pager));
    engine.start_monitoring(&dashboard_sub).unwrap();
    engine.start_monitoring(&pager_sub).unwrap();

    let reports = Rc::new(RefCell::new(Vec::new()));
    let report_sink = reports.clone();
    let _refresh = engine.start_report_refresh(move |report| report_sink.borrow_mut().push(report.clone()));

    // Navigation: fast server, quick DOM.
    let navigation = NavigationEntry {
        domain_lookup_start: 2.0,
        domain_lookup_end: 14.0,
        connect_start: 14.0,
        connect_end: 40.0,
        request_start: 41.0,
        response_start: 180.0,
        response_end: 260.0,
        dom_interactive: 720.0,
    };
    for sample in navigation.to_samples() {
        page.push(sample);
    }
    page.push(MetricSample::Fcp(950.0));
    page.push(MetricSample::Lcp(2100.0));
    assert_eq!(engine.performance_score(), 100);

    // Layout shifts inside one session window.
    let mut shifts = LayoutShiftAccumulator::new();
    for (value, at) in [(0.04, 1000.0), (0.05, 1400.0), (0.02, 1900.0)] {
        if let Some(cls) = shifts.add(value, at, false) {
            page.push(MetricSample::Cls(cls));
        }
    }
    assert!((engine.metrics().cls.unwrap() - 0.11).abs() < 1e-9);

    // Sluggish interactions.
    let mut interactions = InteractionLatencyTracker::new();
    for (id, duration) in [(1, 120.0), (2, 640.0), (2, 660.0), (3, 90.0)] {
        if let Some(inp) = interactions.add(id, duration) {
            page.push(MetricSample::Inp(inp));
        }
    }
    assert_eq!(engine.metrics().inp, Some(660.0));

    // Gallery work over its tightened budget.
    let gallery = engine.gallery().unwrap();
    gallery.track_gallery_load(3000.0, 5100.0, 60);
    gallery.track_artwork_detail("the-kiss", 180.0);

    scheduler.advance(5_000.0);

    // History has everything; subscribers only high and critical.
    let history = engine.advanced_report().alerts;
    assert!(history.iter().any(|a| a.metric == "cls" && a.severity == Severity::Medium));
    assert!(history.iter().any(|a| a.metric == "inp" && a.severity == Severity::Critical));
    assert!(history
        .iter()
        .any(|a| a.metric == "artworkListLoadTime" && a.severity == Severity::High));
    assert!(dashboard.alerts.borrow().iter().all(|a| a.severity >= Severity::High));
    assert_eq!(dashboard.alert_count(), pager_alerts.borrow().len());
    assert!(!dashboard.alerts.borrow().iter().any(|a| a.metric == "cls"));
    // Budget events are not filtered.
    assert!(dashboard.budgets.borrow().iter().any(|e| e.budget.as_str() == "cls"));

    // Score: CLS and INP are needs-improvement and poor.
    let score = engine.performance_score();
    assert!(score < 100);
    let report = reports.borrow().last().cloned().unwrap();
    assert_eq!(report.score, score);

    let correlation = engine
        .analyze_error(&ObservedError::new("TypeError", "Cannot read properties of null"))
        .unwrap();
    assert!(correlation.performance_related);
    assert!(correlation.summary.contains("INP"));

    let exported = engine.export_report();
    let connection = exported.rum.as_ref().and_then(|rum| rum.connection.clone()).unwrap();
    assert_eq!(connection.effective_type.as_deref(), Some("4g"));
    assert_eq!(exported.alerts.len(), history.len());

    drop(dashboard_sub);
    assert!(engine.is_monitoring());
    drop(pager_sub);
    assert!(!engine.is_monitoring());
    assert!(!page.push(MetricSample::Lcp(9000.0)));
}

#[test]
fn test_restart_after_stop() {
    let (engine, _scheduler) = manual_engine(MonitorConfig::default());
    let (source, handle) = PushSource::new("custom");
    engine.add_source(Box::new(source));
    let listener = RecordingListener::new();
    let subscription = engine.subscribe(listener.clone());

    engine.start_monitoring(&subscription).unwrap();
    handle.push(MetricSample::Ttfb(900.0));
    engine.stop_monitoring(&subscription);
    assert!(!handle.push(MetricSample::Ttfb(950.0)));

    engine.start_monitoring(&subscription).unwrap();
    assert!(handle.push(MetricSample::Ttfb(1000.0)));

    assert_eq!(listener.update_count(), 2);
    // Still over the 800ms budget, but it already alerted this session.
    let budget_alerts = engine
        .advanced_report()
        .alerts
        .into_iter()
        .filter(|a| a.alert_type == AlertType::BudgetExceeded)
        .count();
    assert_eq!(budget_alerts, 1);
}
