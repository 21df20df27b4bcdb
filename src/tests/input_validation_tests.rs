// Input validation tests: every public entry point must shrug off bad input

use crate::alerts::Severity;
use crate::config::MonitorConfig;
use crate::metrics::{MetricKey, MetricSample, NavigationTiming, PerformanceMetrics};
use super::support::*;

#[test]
fn test_non_finite_samples_are_rejected() {
    let mut metrics = PerformanceMetrics::new();
    let invalid = vec![
        MetricSample::Lcp(f64::NAN),
        MetricSample::Fcp(f64::INFINITY),
        MetricSample::Cls(-0.1),
        MetricSample::Downlink(f64::NEG_INFINITY),
        MetricSample::NavigationTiming(NavigationTiming {
            dns: 1.0,
            tcp: f64::NAN,
            download: 3.0,
        }),
        MetricSample::ConnectionType(String::new()),
    ];

    for sample in invalid {
        assert_eq!(metrics.merge(sample.clone()), None, "{:?}", sample);
    }
    assert!(metrics.is_empty());
}

#[test]
fn test_zero_is_a_valid_sample() {
    let mut metrics = PerformanceMetrics::new();
    assert_eq!(metrics.merge(MetricSample::Cls(0.0)), Some(MetricKey::Cls));
    assert_eq!(metrics.cls, Some(0.0));
    assert!(metrics.is_set(MetricKey::Cls));
}

#[test]
fn test_metric_and_severity_names() {
    assert_eq!("artworkListLoadTime".parse::<MetricKey>().unwrap(), MetricKey::ArtworkListLoadTime);
    assert!("LCP".parse::<MetricKey>().is_err());
    assert!("".parse::<MetricKey>().is_err());

    assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
    assert!("severe".parse::<Severity>().is_err());
}

#[test]
fn test_engine_entry_points_ignore_garbage() {
    let (engine, _scheduler) = manual_engine(MonitorConfig::default());

    engine.record_render_time("Grid", -4.0);
    engine.record_render_time("Grid", f64::INFINITY);
    assert!(engine.set_budget(MetricKey::Lcp, f64::NAN).is_err());
    assert!(engine.set_budget(MetricKey::EffectiveType, 100.0).is_err());

    let gallery = engine.gallery().unwrap();
    gallery.track_search_performance("", f64::NAN, 0);
    gallery.track_image_loading("", -1.0, 0);
    gallery.track_filter_performance(&[], 0.0);

    let metrics = engine.metrics();
    assert_eq!(metrics.search_response_time, Some(0.0));
    assert_eq!(metrics.image_loading_time, Some(0.0));
    assert!(engine.advanced_report().alerts.is_empty());
    assert_eq!(engine.performance_score(), 100);
}

#[test]
fn test_numeric_sample_construction() {
    assert_eq!(
        MetricSample::numeric(MetricKey::HardwareConcurrency, 7.6).unwrap(),
        MetricSample::HardwareConcurrency(8)
    );
    assert!(MetricSample::numeric(MetricKey::NavigationTiming, 1.0).is_err());
    assert!(MetricSample::numeric(MetricKey::Rtt, f64::NAN).is_err());
}
