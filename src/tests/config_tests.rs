// Configuration loading and validation tests

use std::io::Write;

use crate::alerts::Severity;
use crate::budget::{BudgetSet, RearmPolicy};
use crate::config::*;
use crate::error::MonitorError;
use crate::metrics::MetricKey;

#[test]
fn test_defaults() {
    let config = MonitorConfig::default();

    assert_eq!(config.alert_threshold, Severity::Medium);
    assert_eq!(config.update_interval, DEFAULT_UPDATE_INTERVAL_MS);
    assert!(config.enable_gallery_tracking);
    assert!(config.enable_error_correlation);
    assert!(config.enable_bundle_analysis);
    assert_eq!(config.budget_rearm, RearmPolicy::OncePerSession);
    assert!(config.validate().is_ok());
    assert_eq!(config.budget_set().unwrap(), BudgetSet::recommended());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = MonitorConfig::from_json(
        r#"{ "alertThreshold": "high", "updateInterval": 5000, "enableBundleAnalysis": false }"#,
    )
    .unwrap();

    assert_eq!(config.alert_threshold, Severity::High);
    assert_eq!(config.update_interval, 5000);
    assert!(!config.enable_bundle_analysis);
    assert!(config.enable_gallery_tracking);
    assert_eq!(config.journey_capacity, MonitorConfig::default().journey_capacity);
}

#[test]
fn test_budget_overrides_merge_over_recommended() {
    let config = MonitorConfig::from_json(
        r#"{ "budgets": { "lcp": 2000, "artworkListLoadTime": 1500 }, "budgetRearm": "on_recovery" }"#,
    )
    .unwrap();
    let budgets = config.budget_set().unwrap();

    assert_eq!(budgets.get(MetricKey::Lcp), Some(2000.0));
    assert_eq!(budgets.get(MetricKey::ArtworkListLoadTime), Some(1500.0));
    assert_eq!(budgets.get(MetricKey::Cls), Some(0.1));
    assert_eq!(config.budget_rearm, RearmPolicy::OnRecovery);

    let options = config.monitor_options().unwrap();
    assert_eq!(options.budgets, budgets);
    assert_eq!(options.rearm, RearmPolicy::OnRecovery);
}

#[test]
fn test_only_declared_budgets() {
    let config = MonitorConfig::from_json(
        r#"{ "useRecommendedBudgets": false, "budgets": { "inp": 150 } }"#,
    )
    .unwrap();
    let budgets = config.budget_set().unwrap();

    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets.get(MetricKey::Inp), Some(150.0));
}

#[test]
fn test_toml_config() {
    let config = MonitorConfig::from_toml(
        r#"
alertThreshold = "critical"
updateInterval = 10000
journeyCapacity = 25
scoreAlertThreshold = 60

[budgets]
ttfb = 600
scrollFrameTime = 12.5
"#,
    )
    .unwrap();

    assert_eq!(config.alert_threshold, Severity::Critical);
    assert_eq!(config.update_interval, 10_000);
    assert_eq!(config.journey_capacity, 25);
    assert_eq!(config.score_alert_threshold, 60);
    assert_eq!(config.budgets[&MetricKey::Ttfb], 600.0);
    assert_eq!(config.budgets[&MetricKey::ScrollFrameTime], 12.5);
}

#[test]
fn test_validation_errors() {
    let invalid = [
        r#"{ "updateInterval": 0 }"#,
        r#"{ "alertHistoryCapacity": 0 }"#,
        r#"{ "journeyCapacity": 0 }"#,
        r#"{ "scoreAlertThreshold": 101 }"#,
        r#"{ "frameBudgetMs": -1 }"#,
        r#"{ "budgets": { "lcp": 0 } }"#,
        r#"{ "budgets": { "connectionType": 10 } }"#,
    ];

    for json in invalid {
        assert!(
            matches!(MonitorConfig::from_json(json), Err(MonitorError::InvalidConfig(_))),
            "{}",
            json
        );
    }
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        MonitorConfig::from_json(r#"{ "alertThreshold": "urgent" }"#),
        Err(MonitorError::Serialization(_))
    ));
    assert!(matches!(
        MonitorConfig::from_json(r#"{ "budgets": { "bogus": 10 } }"#),
        Err(MonitorError::Serialization(_))
    ));
    assert!(matches!(
        MonitorConfig::from_toml("updateInterval = \"soon\""),
        Err(MonitorError::ConfigParse(_))
    ));
}

#[test]
fn test_from_path() {
    let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(toml_file, "updateInterval = 2000").unwrap();
    let config = MonitorConfig::from_path(toml_file.path()).unwrap();
    assert_eq!(config.update_interval, 2000);

    let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(json_file, r#"{{ "enableGalleryTracking": false }}"#).unwrap();
    let config = MonitorConfig::from_path(json_file.path()).unwrap();
    assert!(!config.enable_gallery_tracking);

    let yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    assert!(matches!(
        MonitorConfig::from_path(yaml_file.path()),
        Err(MonitorError::InvalidConfig(_))
    ));

    assert!(matches!(
        MonitorConfig::from_path("/no/such/dir/monitor.toml"),
        Err(MonitorError::Io(_))
    ));
}

#[test]
fn test_config_round_trips_through_json() {
    let mut config = MonitorConfig::default();
    config.budgets.insert(MetricKey::Fcp, 1500.0);
    config.alert_threshold = Severity::Low;

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"alertThreshold\":\"low\""));
    assert!(json.contains("\"fcp\":1500.0"));
    assert_eq!(MonitorConfig::from_json(&json).unwrap(), config);
}
