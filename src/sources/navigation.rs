// Navigation timing source: TTFB, DOM interactive and the request breakdown.

use serde::{Deserialize, Serialize};

use super::{SampleSink, SampleSource};
use crate::error::Result;
use crate::metrics::{MetricSample, NavigationTiming};

const SOURCE_NAME: &str = "navigation";

/// The subset of a `PerformanceNavigationTiming` entry the engine reads.
/// Every timestamp is relative to navigation start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEntry {
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
}

impl NavigationEntry {
    /// Samples derived from the entry. Phases the browser reports as zero
    /// (cached or cross-origin without Timing-Allow-Origin) come out as zero
    /// rather than negative.
    pub fn to_samples(&self) -> Vec<MetricSample> {
        let span = |start: f64, end: f64| (end - start).max(0.0);
        let mut samples = Vec::with_capacity(3);

        if self.response_start > 0.0 {
            samples.push(MetricSample::Ttfb(self.response_start));
        }
        if self.dom_interactive > 0.0 {
            samples.push(MetricSample::DomInteractive(self.dom_interactive));
        }
        samples.push(MetricSample::NavigationTiming(NavigationTiming {
            dns: span(self.domain_lookup_start, self.domain_lookup_end),
            tcp: span(self.connect_start, self.connect_end),
            download: span(self.response_start, self.response_end),
        }));
        samples
    }
}

#[derive(Default)]
pub struct NavigationSource {
    #[cfg(target_arch = "wasm32")]
    observer: Option<super::js::ObserverHandle>,
}

impl NavigationSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(target_arch = "wasm32")]
fn read_entry(entry: &wasm_bindgen::JsValue) -> NavigationEntry {
    use super::js::js_number;
    let field = |key: &str| js_number(entry, key).unwrap_or(0.0);
    NavigationEntry {
        domain_lookup_start: field("domainLookupStart"),
        domain_lookup_end: field("domainLookupEnd"),
        connect_start: field("connectStart"),
        connect_end: field("connectEnd"),
        request_start: field("requestStart"),
        response_start: field("responseStart"),
        response_end: field("responseEnd"),
        dom_interactive: field("domInteractive"),
    }
}

impl SampleSource for NavigationSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[cfg(target_arch = "wasm32")]
    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        let handle = super::js::ObserverHandle::observe(SOURCE_NAME, "navigation", None, move |entry| {
            sink.push_all(read_entry(entry).to_samples());
        })?;
        self.observer = Some(handle);
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn attach(&mut self, _sink: SampleSink) -> Result<()> {
        super::browser_only(SOURCE_NAME)
    }

    fn detach(&mut self) {
        #[cfg(target_arch = "wasm32")]
        {
            self.observer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_to_samples() {
        let entry = NavigationEntry {
            domain_lookup_start: 5.0,
            domain_lookup_end: 25.0,
            connect_start: 25.0,
            connect_end: 70.0,
            request_start: 71.0,
            response_start: 310.0,
            response_end: 420.0,
            dom_interactive: 900.0,
        };
        let samples = entry.to_samples();
        assert_eq!(samples[0], MetricSample::Ttfb(310.0));
        assert_eq!(samples[1], MetricSample::DomInteractive(900.0));
        assert_eq!(
            samples[2],
            MetricSample::NavigationTiming(NavigationTiming {
                dns: 20.0,
                tcp: 45.0,
                download: 110.0,
            })
        );
    }

    #[test]
    fn test_zeroed_entry_yields_only_breakdown() {
        let samples = NavigationEntry::default().to_samples();
        assert_eq!(samples.len(), 1);
        assert!(matches!(samples[0], MetricSample::NavigationTiming(_)));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_unavailable_outside_browser() {
        let mut source = NavigationSource::new();
        let err = source.attach(SampleSink::new(|_| {})).unwrap_err();
        assert!(matches!(err, crate::error::MonitorError::SourceUnavailable { .. }));
    }
}
