// Gallery tracker tests

use std::rc::Rc;

use super::support::*;
use crate::alerts::AlertType;
use crate::budget::BudgetSet;
use crate::clock::ManualClock;
use crate::config::MonitorConfig;
use crate::environment::HeadlessEnvironment;
use crate::metrics::MetricKey;
use crate::performance_monitor::{MonitorOptions, PerformanceMonitor};
use crate::scheduler::{ManualScheduler, FRAME_INTERVAL_MS};
use crate::trackers::gallery::*;

fn tracker_with_budget(
    metric: MetricKey,
    allocated: f64,
    journey_capacity: usize,
) -> (GalleryTracker, PerformanceMonitor, ManualScheduler) {
    let clock = ManualClock::new(T0);
    let scheduler = ManualScheduler::new(clock.clone());
    let monitor = PerformanceMonitor::new(
        MonitorOptions {
            budgets: BudgetSet::empty().with(metric, allocated).unwrap(),
            ..MonitorOptions::default()
        },
        Rc::new(clock),
        Rc::new(HeadlessEnvironment),
    );
    let tracker = GalleryTracker::new(monitor.clone(), Rc::new(scheduler.clone()), journey_capacity);
    (tracker, monitor, scheduler)
}

#[test]
fn test_gallery_load_within_budget() {
    let (tracker, monitor, _scheduler) =
        tracker_with_budget(MetricKey::ArtworkListLoadTime, 2000.0, JOURNEY_CAPACITY);

    tracker.track_gallery_load(1000.0, 1800.0, 24);

    assert_eq!(monitor.metrics().artwork_list_load_time, Some(800.0));
    assert!(monitor.alerts().is_empty());

    let journey = tracker.user_journey();
    assert_eq!(journey.len(), 1);
    assert_eq!(journey[0].interaction_type, InteractionType::GalleryLoad);
    assert_eq!(journey[0].duration, 800.0);
    assert_eq!(journey[0].context["itemCount"], 24);
    assert_eq!(journey[0].timestamp, T0);
}

#[test]
fn test_gallery_load_over_budget() {
    let (tracker, monitor, _scheduler) =
        tracker_with_budget(MetricKey::ArtworkListLoadTime, 700.0, JOURNEY_CAPACITY);

    tracker.track_gallery_load(1000.0, 1800.0, 24);

    let alerts = monitor.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::BudgetExceeded);
    assert_eq!(alerts[0].metric, "artworkListLoadTime");
    assert_eq!(alerts[0].value, 800.0);
    assert_eq!(alerts[0].threshold, 700.0);
}

#[test]
fn test_journey_is_logged_before_alerts_fire() {
    let (tracker, monitor, _scheduler) =
        tracker_with_budget(MetricKey::SearchResponseTime, 100.0, JOURNEY_CAPACITY);
    let tracker = Rc::new(tracker);
    let journey_lengths = Rc::new(std::cell::RefCell::new(Vec::new()));

    let observed = Rc::downgrade(&tracker);
    let sink = journey_lengths.clone();
    let hooks = crate::performance_monitor::MonitorHooks::new().on_alert(move |_| {
        if let Some(tracker) = observed.upgrade() {
            sink.borrow_mut().push(tracker.user_journey().len());
        }
        Ok(())
    });
    monitor.start_monitoring(Rc::new(hooks)).unwrap();

    tracker.track_search_performance("monet water lilies", 350.0, 12);
    assert_eq!(*journey_lengths.borrow(), vec![1]);
}

#[test]
fn test_each_interaction_writes_its_metric() {
    let (tracker, monitor, _scheduler) =
        tracker_with_budget(MetricKey::Lcp, 2500.0, JOURNEY_CAPACITY);

    tracker.track_artwork_detail("starry-night", 320.0);
    tracker.track_search_performance("cézanne", 140.0, 7);
    tracker.track_filter_performance(&["period:impressionism".to_string()], 90.0);
    tracker.track_image_loading("https://cdn.example/a/1.avif", 410.0, 182_000);

    let metrics = monitor.metrics();
    assert_eq!(metrics.artwork_modal_open_time, Some(320.0));
    assert_eq!(metrics.search_response_time, Some(140.0));
    assert_eq!(metrics.filter_response_time, Some(90.0));
    assert_eq!(metrics.image_loading_time, Some(410.0));

    let journey = tracker.user_journey();
    let kinds: Vec<InteractionType> = journey.iter().map(|i| i.interaction_type).collect();
    assert_eq!(
        kinds,
        vec![
            InteractionType::ArtworkDetail,
            InteractionType::Search,
            InteractionType::Filter,
            InteractionType::ImageLoad,
        ]
    );
    assert_eq!(journey[0].element, "artwork:starry-night");
    assert_eq!(journey[1].context["resultCount"], 7);
    assert_eq!(journey[2].context["filters"][0], "period:impressionism");
    assert_eq!(journey[3].context["sizeBytes"], 182_000);
}

#[test]
fn test_invalid_durations_are_clamped() {
    let (tracker, monitor, _scheduler) =
        tracker_with_budget(MetricKey::Lcp, 2500.0, JOURNEY_CAPACITY);

    tracker.track_gallery_load(2000.0, 1500.0, 3);
    tracker.track_artwork_detail("x", f64::NAN);

    assert_eq!(monitor.metrics().artwork_list_load_time, Some(0.0));
    assert_eq!(monitor.metrics().artwork_modal_open_time, Some(0.0));
    assert!(tracker.user_journey().iter().all(|i| i.duration == 0.0));
}

#[test]
fn test_journey_is_bounded() {
    let (tracker, _monitor, _scheduler) = tracker_with_budget(MetricKey::Lcp, 2500.0, 3);
    assert_eq!(tracker.journey_capacity(), 3);

    for i in 0..5 {
        tracker.track_artwork_detail(&format!("art-{}", i), 100.0);
    }

    let elements: Vec<String> = tracker.user_journey().into_iter().map(|i| i.element).collect();
    assert_eq!(elements, vec!["artwork:art-2", "artwork:art-3", "artwork:art-4"]);

    tracker.clear_journey();
    assert!(tracker.user_journey().is_empty());
}

#[test]
fn test_scroll_is_throttled_to_frames() {
    let (tracker, monitor, scheduler) =
        tracker_with_budget(MetricKey::ScrollFrameTime, 16.7, JOURNEY_CAPACITY);

    for frame in [8.0, 11.0, 24.0, 13.0] {
        tracker.track_scroll_performance(frame);
    }
    // Leading edge only so far.
    assert_eq!(monitor.metrics().scroll_frame_time, Some(8.0));
    assert!(monitor.alerts().is_empty());

    scheduler.advance(FRAME_INTERVAL_MS);
    // The slowest frame of the burst survives coalescing.
    assert_eq!(monitor.metrics().scroll_frame_time, Some(24.0));

    let scrolls: Vec<f64> = tracker
        .user_journey()
        .into_iter()
        .filter(|i| i.interaction_type == InteractionType::Scroll)
        .map(|i| i.duration)
        .collect();
    assert_eq!(scrolls, vec![8.0, 24.0]);

    let alerts = monitor.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::BudgetExceeded);
    assert_eq!(alerts[0].metric, "scrollFrameTime");
    assert_eq!(alerts[0].value, 24.0);
}

#[test]
fn test_jank_frame_mid_burst_is_not_lost() {
    let (tracker, monitor, scheduler) =
        tracker_with_budget(MetricKey::ScrollFrameTime, 16.7, JOURNEY_CAPACITY);

    tracker.track_scroll_performance(8.0);
    tracker.track_scroll_performance(40.0);
    tracker.track_scroll_performance(9.0);
    scheduler.advance(100.0);

    assert_eq!(monitor.metrics().scroll_frame_time, Some(40.0));
    assert_eq!(monitor.alerts().len(), 1);
}

#[test]
fn test_cancel_pending_scroll() {
    let (tracker, monitor, scheduler) =
        tracker_with_budget(MetricKey::ScrollFrameTime, 16.7, JOURNEY_CAPACITY);

    tracker.track_scroll_performance(8.0);
    tracker.track_scroll_performance(30.0);
    tracker.cancel_pending();
    scheduler.advance(100.0);

    assert_eq!(monitor.metrics().scroll_frame_time, Some(8.0));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_engine_gallery_uses_configured_capacity() {
    let config = MonitorConfig {
        journey_capacity: 2,
        ..MonitorConfig::default()
    };
    let (engine, _scheduler) = manual_engine(config);
    let gallery = engine.gallery().unwrap();

    gallery.track_gallery_load(0.0, 2500.0, 48);
    gallery.track_artwork_detail("a", 100.0);
    gallery.track_artwork_detail("b", 100.0);

    assert_eq!(gallery.user_journey().len(), 2);
    // Recommended budget for the gallery list is 2000ms.
    assert_eq!(engine.advanced_report().alerts.len(), 1);
}

#[test]
fn test_interaction_serialization() {
    let (tracker, _monitor, _scheduler) =
        tracker_with_budget(MetricKey::Lcp, 2500.0, JOURNEY_CAPACITY);
    tracker.track_gallery_load(0.0, 640.0, 12);

    let json = serde_json::to_value(tracker.user_journey()).unwrap();
    assert_eq!(json[0]["type"], "gallery_load");
    assert_eq!(json[0]["element"], "gallery");
    assert_eq!(json[0]["context"]["itemCount"], 12);
}
