// Layout shift source. CLS is the largest session window of shifts: shifts
// less than 1 s apart join the current window, and a window closes after 5 s.

use super::{SampleSink, SampleSource};
use crate::error::Result;

const SOURCE_NAME: &str = "layout-shift";

pub const SESSION_GAP_MS: f64 = 1000.0;
pub const SESSION_MAX_MS: f64 = 5000.0;

#[derive(Debug, Clone, Default)]
pub struct LayoutShiftAccumulator {
    session_value: f64,
    session_first_ms: f64,
    session_last_ms: f64,
    max_session_value: f64,
    entries: usize,
}

impl LayoutShiftAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entry in. Returns the new CLS when it changed.
    /// Shifts right after user input are expected and never count.
    pub fn add(&mut self, value: f64, start_time: f64, had_recent_input: bool) -> Option<f64> {
        if had_recent_input || !value.is_finite() || value <= 0.0 {
            return None;
        }

        let continues_session = self.entries > 0
            && start_time - self.session_last_ms < SESSION_GAP_MS
            && start_time - self.session_first_ms < SESSION_MAX_MS;

        if continues_session {
            self.session_value += value;
        } else {
            self.session_value = value;
            self.session_first_ms = start_time;
        }
        self.session_last_ms = start_time;
        self.entries += 1;

        if self.session_value > self.max_session_value {
            self.max_session_value = self.session_value;
            Some(self.max_session_value)
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.max_session_value
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Default)]
pub struct LayoutShiftSource {
    #[cfg(target_arch = "wasm32")]
    observer: Option<super::js::ObserverHandle>,
}

impl LayoutShiftSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSource for LayoutShiftSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[cfg(target_arch = "wasm32")]
    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        use super::js::{js_bool, js_number, ObserverHandle};
        use crate::metrics::MetricSample;

        let mut accumulator = LayoutShiftAccumulator::new();
        let handle = ObserverHandle::observe(SOURCE_NAME, "layout-shift", None, move |entry| {
            let changed = accumulator.add(
                js_number(entry, "value").unwrap_or(0.0),
                js_number(entry, "startTime").unwrap_or(0.0),
                js_bool(entry, "hadRecentInput").unwrap_or(false),
            );
            if let Some(cls) = changed {
                sink.push(MetricSample::Cls(cls));
            }
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
