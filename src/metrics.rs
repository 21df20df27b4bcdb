// Canonical metrics record for a monitored page.
//
// Every field is optional: a metric is absent until its source has reported,
// and an absent metric is never scored or budgeted as zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MonitorError;

/// Names of every metric the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    Lcp,
    Fcp,
    Cls,
    Inp,
    Fid,
    Ttfb,
    DomInteractive,
    NavigationTiming,
    DeviceMemory,
    HardwareConcurrency,
    ConnectionType,
    EffectiveType,
    Downlink,
    Rtt,
    ArtworkListLoadTime,
    ArtworkModalOpenTime,
    SearchResponseTime,
    FilterResponseTime,
    ImageLoadingTime,
    ScrollFrameTime,
}

impl MetricKey {
    pub const ALL: [MetricKey; 20] = [
        MetricKey::Lcp,
        MetricKey::Fcp,
        MetricKey::Cls,
        MetricKey::Inp,
        MetricKey::Fid,
        MetricKey::Ttfb,
        MetricKey::DomInteractive,
        MetricKey::NavigationTiming,
        MetricKey::DeviceMemory,
        MetricKey::HardwareConcurrency,
        MetricKey::ConnectionType,
        MetricKey::EffectiveType,
        MetricKey::Downlink,
        MetricKey::Rtt,
        MetricKey::ArtworkListLoadTime,
        MetricKey::ArtworkModalOpenTime,
        MetricKey::SearchResponseTime,
        MetricKey::FilterResponseTime,
        MetricKey::ImageLoadingTime,
        MetricKey::ScrollFrameTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::Lcp => "lcp",
            MetricKey::Fcp => "fcp",
            MetricKey::Cls => "cls",
            MetricKey::Inp => "inp",
            MetricKey::Fid => "fid",
            MetricKey::Ttfb => "ttfb",
            MetricKey::DomInteractive => "domInteractive",
            MetricKey::NavigationTiming => "navigationTiming",
            MetricKey::DeviceMemory => "deviceMemory",
            MetricKey::HardwareConcurrency => "hardwareConcurrency",
            MetricKey::ConnectionType => "connectionType",
            MetricKey::EffectiveType => "effectiveType",
            MetricKey::Downlink => "downlink",
            MetricKey::Rtt => "rtt",
            MetricKey::ArtworkListLoadTime => "artworkListLoadTime",
            MetricKey::ArtworkModalOpenTime => "artworkModalOpenTime",
            MetricKey::SearchResponseTime => "searchResponseTime",
            MetricKey::FilterResponseTime => "filterResponseTime",
            MetricKey::ImageLoadingTime => "imageLoadingTime",
            MetricKey::ScrollFrameTime => "scrollFrameTime",
        }
    }

    /// Short label used in alert messages
    pub fn label(self) -> &'static str {
        match self {
            MetricKey::Lcp => "LCP",
            MetricKey::Fcp => "FCP",
            MetricKey::Cls => "CLS",
            MetricKey::Inp => "INP",
            MetricKey::Fid => "FID",
            MetricKey::Ttfb => "TTFB",
            MetricKey::DomInteractive => "DOM interactive",
            MetricKey::ArtworkListLoadTime => "gallery load time",
            MetricKey::ArtworkModalOpenTime => "artwork detail open time",
            MetricKey::SearchResponseTime => "search response time",
            MetricKey::FilterResponseTime => "filter response time",
            MetricKey::ImageLoadingTime => "image loading time",
            MetricKey::ScrollFrameTime => "scroll frame time",
            other => other.as_str(),
        }
    }

    /// Whether the metric carries a single number that budgets can compare.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            MetricKey::NavigationTiming | MetricKey::ConnectionType | MetricKey::EffectiveType
        )
    }

    /// Unit suffix for human readable values
    pub fn unit(self) -> &'static str {
        match self {
            MetricKey::Cls | MetricKey::HardwareConcurrency => "",
            MetricKey::DeviceMemory => "GB",
            MetricKey::Downlink => "Mbps",
            MetricKey::NavigationTiming | MetricKey::ConnectionType | MetricKey::EffectiveType => "",
            _ => "ms",
        }
    }

    pub fn format_value(self, value: f64) -> String {
        match self {
            MetricKey::Cls => format!("{:.3}", value),
            _ => format!("{:.0}{}", value, self.unit()),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| MonitorError::InvalidConfig(format!("unknown metric `{}`", s)))
    }
}

/// Breakdown of the navigation request, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationTiming {
    pub dns: f64,
    pub tcp: f64,
    pub download: f64,
}

/// One observed value for exactly one metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSample {
    Lcp(f64),
    Fcp(f64),
    Cls(f64),
    Inp(f64),
    Fid(f64),
    Ttfb(f64),
    DomInteractive(f64),
    NavigationTiming(NavigationTiming),
    DeviceMemory(f64),
    HardwareConcurrency(u32),
    ConnectionType(String),
    EffectiveType(String),
    Downlink(f64),
    Rtt(f64),
    ArtworkListLoadTime(f64),
    ArtworkModalOpenTime(f64),
    SearchResponseTime(f64),
    FilterResponseTime(f64),
    ImageLoadingTime(f64),
    ScrollFrameTime(f64),
}

impl MetricSample {
    pub fn key(&self) -> MetricKey {
        match self {
            MetricSample::Lcp(_) => MetricKey::Lcp,
            MetricSample::Fcp(_) => MetricKey::Fcp,
            MetricSample::Cls(_) => MetricKey::Cls,
            MetricSample::Inp(_) => MetricKey::Inp,
            MetricSample::Fid(_) => MetricKey::Fid,
            MetricSample::Ttfb(_) => MetricKey::Ttfb,
            MetricSample::DomInteractive(_) => MetricKey::DomInteractive,
            MetricSample::NavigationTiming(_) => MetricKey::NavigationTiming,
            MetricSample::DeviceMemory(_) => MetricKey::DeviceMemory,
            MetricSample::HardwareConcurrency(_) => MetricKey::HardwareConcurrency,
            MetricSample::ConnectionType(_) => MetricKey::ConnectionType,
            MetricSample::EffectiveType(_) => MetricKey::EffectiveType,
            MetricSample::Downlink(_) => MetricKey::Downlink,
            MetricSample::Rtt(_) => MetricKey::Rtt,
            MetricSample::ArtworkListLoadTime(_) => MetricKey::ArtworkListLoadTime,
            MetricSample::ArtworkModalOpenTime(_) => MetricKey::ArtworkModalOpenTime,
            MetricSample::SearchResponseTime(_) => MetricKey::SearchResponseTime,
            MetricSample::FilterResponseTime(_) => MetricKey::FilterResponseTime,
            MetricSample::ImageLoadingTime(_) => MetricKey::ImageLoadingTime,
            MetricSample::ScrollFrameTime(_) => MetricKey::ScrollFrameTime,
        }
    }

    /// Build a sample for a numeric metric. Fails for categorical keys and
    /// for values that are not finite and non-negative.
    pub fn numeric(key: MetricKey, value: f64) -> Result<MetricSample, MonitorError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "{} must be a finite, non-negative number (got {})",
                key, value
            )));
        }
        let sample = match key {
            MetricKey::Lcp => MetricSample::Lcp(value),
            MetricKey::Fcp => MetricSample::Fcp(value),
            MetricKey::Cls => MetricSample::Cls(value),
            MetricKey::Inp => MetricSample::Inp(value),
            MetricKey::Fid => MetricSample::Fid(value),
            MetricKey::Ttfb => MetricSample::Ttfb(value),
            MetricKey::DomInteractive => MetricSample::DomInteractive(value),
            MetricKey::DeviceMemory => MetricSample::DeviceMemory(value),
            MetricKey::HardwareConcurrency => MetricSample::HardwareConcurrency(value.round() as u32),
            MetricKey::Downlink => MetricSample::Downlink(value),
            MetricKey::Rtt => MetricSample::Rtt(value),
            MetricKey::ArtworkListLoadTime => MetricSample::ArtworkListLoadTime(value),
            MetricKey::ArtworkModalOpenTime => MetricSample::ArtworkModalOpenTime(value),
            MetricKey::SearchResponseTime => MetricSample::SearchResponseTime(value),
            MetricKey::FilterResponseTime => MetricSample::FilterResponseTime(value),
            MetricKey::ImageLoadingTime => MetricSample::ImageLoadingTime(value),
            MetricKey::ScrollFrameTime => MetricSample::ScrollFrameTime(value),
            MetricKey::NavigationTiming | MetricKey::ConnectionType | MetricKey::EffectiveType => {
                return Err(MonitorError::InvalidConfig(format!("{} is not numeric", key)))
            }
        };
        Ok(sample)
    }

    /// Numeric payload, if the sample carries one
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricSample::NavigationTiming(_)
            | MetricSample::ConnectionType(_)
            | MetricSample::EffectiveType(_) => None,
            MetricSample::HardwareConcurrency(n) => Some(*n as f64),
            MetricSample::Lcp(v)
            | MetricSample::Fcp(v)
            | MetricSample::Cls(v)
            | MetricSample::Inp(v)
            | MetricSample::Fid(v)
            | MetricSample::Ttfb(v)
            | MetricSample::DomInteractive(v)
            | MetricSample::DeviceMemory(v)
            | MetricSample::Downlink(v)
            | MetricSample::Rtt(v)
            | MetricSample::ArtworkListLoadTime(v)
            | MetricSample::ArtworkModalOpenTime(v)
            | MetricSample::SearchResponseTime(v)
            | MetricSample::FilterResponseTime(v)
            | MetricSample::ImageLoadingTime(v)
            | MetricSample::ScrollFrameTime(v) => Some(*v),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            MetricSample::NavigationTiming(t) => [t.dns, t.tcp, t.download]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0),
            MetricSample::ConnectionType(s) | MetricSample::EffectiveType(s) => !s.is_empty(),
            other => other.value().map_or(false, |v| v.is_finite() && v >= 0.0),
        }
    }
}

/// Everything currently known about the page's performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_interactive: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_timing: Option<NavigationTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_list_load_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_modal_open_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_loading_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_frame_time: Option<f64>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the sample's field and nothing else. Returns the key written, or
    /// `None` when the sample was rejected (non-finite, negative or empty).
    pub fn merge(&mut self, sample: MetricSample) -> Option<MetricKey> {
        if !sample.is_valid() {
            log::warn!("Discarding invalid sample {:?}", sample);
            return None;
        }

        let key = sample.key();
        match sample {
            MetricSample::Lcp(v) => self.lcp = Some(v),
            MetricSample::Fcp(v) => self.fcp = Some(v),
            MetricSample::Cls(v) => self.cls = Some(v),
            MetricSample::Inp(v) => self.inp = Some(v),
            MetricSample::Fid(v) => self.fid = Some(v),
            MetricSample::Ttfb(v) => self.ttfb = Some(v),
            MetricSample::DomInteractive(v) => self.dom_interactive = Some(v),
            MetricSample::NavigationTiming(t) => self.navigation_timing = Some(t),
            MetricSample::DeviceMemory(v) => self.device_memory = Some(v),
            MetricSample::HardwareConcurrency(n) => self.hardware_concurrency = Some(n),
            MetricSample::ConnectionType(s) => self.connection_type = Some(s),
            MetricSample::EffectiveType(s) => self.effective_type = Some(s),
            MetricSample::Downlink(v) => self.downlink = Some(v),
            MetricSample::Rtt(v) => self.rtt = Some(v),
            MetricSample::ArtworkListLoadTime(v) => self.artwork_list_load_time = Some(v),
            MetricSample::ArtworkModalOpenTime(v) => self.artwork_modal_open_time = Some(v),
            MetricSample::SearchResponseTime(v) => self.search_response_time = Some(v),
            MetricSample::FilterResponseTime(v) => self.filter_response_time = Some(v),
            MetricSample::ImageLoadingTime(v) => self.image_loading_time = Some(v),
            MetricSample::ScrollFrameTime(v) => self.scroll_frame_time = Some(v),
        }
        Some(key)
    }

    /// Numeric value of a metric, if it has been sampled
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::Lcp => self.lcp,
            MetricKey::Fcp => self.fcp,
            MetricKey::Cls => self.cls,
            MetricKey::Inp => self.inp,
            MetricKey::Fid => self.fid,
            MetricKey::Ttfb => self.ttfb,
            MetricKey::DomInteractive => self.dom_interactive,
            MetricKey::DeviceMemory => self.device_memory,
            MetricKey::HardwareConcurrency => self.hardware_concurrency.map(f64::from),
            MetricKey::Downlink => self.downlink,
            MetricKey::Rtt => self.rtt,
            MetricKey::ArtworkListLoadTime => self.artwork_list_load_time,
            MetricKey::ArtworkModalOpenTime => self.artwork_modal_open_time,
            MetricKey::SearchResponseTime => self.search_response_time,
            MetricKey::FilterResponseTime => self.filter_response_time,
            MetricKey::ImageLoadingTime => self.image_loading_time,
            MetricKey::ScrollFrameTime => self.scroll_frame_time,
            MetricKey::NavigationTiming | MetricKey::ConnectionType | MetricKey::EffectiveType => {
                None
            }
        }
    }

    pub fn is_set(&self, key: MetricKey) -> bool {
        match key {
            MetricKey::NavigationTiming => self.navigation_timing.is_some(),
            MetricKey::ConnectionType => self.connection_type.is_some(),
            MetricKey::EffectiveType => self.effective_type.is_some(),
            numeric => self.get(numeric).is_some(),
        }
    }

    /// Keys that currently hold a value, in declaration order
    pub fn sampled_keys(&self) -> Vec<MetricKey> {
        MetricKey::ALL
            .iter()
            .copied()
            .filter(|key| self.is_set(*key))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sampled_keys().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in MetricKey::ALL {
            assert_eq!(key.as_str().parse::<MetricKey>().unwrap(), key);
        }
        assert!("bogus".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_numeric_sample_rejects_categorical_keys() {
        assert!(MetricSample::numeric(MetricKey::ConnectionType, 1.0).is_err());
        assert!(MetricSample::numeric(MetricKey::Lcp, f64::NAN).is_err());
        assert!(MetricSample::numeric(MetricKey::Lcp, -5.0).is_err());
        assert_eq!(
            MetricSample::numeric(MetricKey::Lcp, 1200.0).unwrap(),
            MetricSample::Lcp(1200.0)
        );
    }

    #[test]
    fn test_merge_rejects_invalid_samples() {
        let mut metrics = PerformanceMetrics::new();
        assert_eq!(metrics.merge(MetricSample::Cls(f64::INFINITY)), None);
        assert_eq!(metrics.merge(MetricSample::EffectiveType(String::new())), None);
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let mut metrics = PerformanceMetrics::new();
        metrics.merge(MetricSample::DomInteractive(640.0));
        metrics.merge(MetricSample::NavigationTiming(NavigationTiming {
            dns: 12.0,
            tcp: 30.0,
            download: 55.0,
        }));

        let json = serde_json::to_value(&metrics).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["domInteractive"], 640.0);
        assert_eq!(object["navigationTiming"]["tcp"], 30.0);
    }
}
