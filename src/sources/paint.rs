// Paint source: first contentful paint and largest contentful paint.

use super::{SampleSink, SampleSource};
use crate::error::Result;
use crate::metrics::MetricSample;

const SOURCE_NAME: &str = "paint";

pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Time of a largest-contentful-paint candidate. Cross-origin images report a
/// zero `renderTime`, so fall back to `loadTime` and then `startTime`.
pub fn lcp_candidate_time(render_time: f64, load_time: f64, start_time: f64) -> f64 {
    [render_time, load_time]
        .into_iter()
        .find(|t| *t > 0.0)
        .unwrap_or(start_time)
}

/// Sample for a `paint` entry; only FCP is kept.
pub fn paint_entry_sample(name: &str, start_time: f64) -> Option<MetricSample> {
    (name == FIRST_CONTENTFUL_PAINT).then_some(MetricSample::Fcp(start_time))
}

#[derive(Default)]
pub struct PaintSource {
    #[cfg(target_arch = "wasm32")]
    observers: Vec<super::js::ObserverHandle>,
}

impl PaintSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSource for PaintSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[cfg(target_arch = "wasm32")]
    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        use super::js::{js_number, js_string, ObserverHandle};

        let fcp_sink = sink.clone();
        let paint = ObserverHandle::observe(SOURCE_NAME, "paint", None, move |entry| {
            let name = js_string(entry, "name").unwrap_or_default();
            let start = js_number(entry, "startTime").unwrap_or(0.0);
            if let Some(sample) = paint_entry_sample(&name, start) {
                fcp_sink.push(sample);
            }
        })?;

        // Each new candidate supersedes the previous one.
        let lcp = ObserverHandle::observe(SOURCE_NAME, "largest-contentful-paint", None, move |entry| {
            let time = lcp_candidate_time(
                js_number(entry, "renderTime").unwrap_or(0.0),
                js_number(entry, "loadTime").unwrap_or(0.0),
                js_number(entry, "startTime").unwrap_or(0.0),
            );
            sink.push(MetricSample::Lcp(time));
        });

        self.observers.push(paint);
        match lcp {
            Ok(handle) => self.observers.push(handle),
            Err(e) => log::info!("LCP not observable, leaving it unset: {}", e),
        }
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn attach(&mut self, _sink: SampleSink) -> Result<()> {
        super::browser_only(SOURCE_NAME)
    }

    fn detach(&mut self) {
        #[cfg(target_arch = "wasm32")]
        self.observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcp_candidate_fallbacks() {
        assert_eq!(lcp_candidate_time(1800.0, 1700.0, 100.0), 1800.0);
        assert_eq!(lcp_candidate_time(0.0, 1700.0, 100.0), 1700.0);
        assert_eq!(lcp_candidate_time(0.0, 0.0, 950.0), 950.0);
    }

    #[test]
    fn test_only_fcp_paint_entries_are_kept() {
        assert_eq!(
            paint_entry_sample("first-contentful-paint", 640.0),
            Some(MetricSample::Fcp(640.0))
        );
        assert_eq!(paint_entry_sample("first-paint", 500.0), None);
    }
}
