//! Metric sample sources.
//!
//! A source turns one family of runtime signals into typed [`MetricSample`]s
//! and pushes them into a [`SampleSink`] handed out by the monitor. Sources
//! hold no policy: merging, scoring and budgets happen downstream.
//!
//! Browser-backed sources register `PerformanceObserver`s on wasm32 and report
//! [`MonitorError::SourceUnavailable`] everywhere else, which the monitor
//! treats as "leave these metrics absent".

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{MonitorError, Result};
use crate::metrics::MetricSample;

pub mod device;
pub mod input;
pub mod layout_shift;
pub mod navigation;
pub mod network;
pub mod paint;

#[cfg(target_arch = "wasm32")]
pub(crate) mod js;

pub use device::DeviceSource;
pub use input::{InputLatencySource, InteractionLatencyTracker};
pub use layout_shift::{LayoutShiftAccumulator, LayoutShiftSource};
pub use navigation::{NavigationEntry, NavigationSource};
pub use network::NetworkSource;
pub use paint::PaintSource;

/// Where a source delivers its samples. Cheap to clone.
#[derive(Clone)]
pub struct SampleSink {
    deliver: Rc<dyn Fn(MetricSample)>,
}

impl SampleSink {
    pub fn new(deliver: impl Fn(MetricSample) + 'static) -> Self {
        SampleSink {
            deliver: Rc::new(deliver),
        }
    }

    pub fn push(&self, sample: MetricSample) {
        (self.deliver)(sample);
    }

    pub fn push_all(&self, samples: impl IntoIterator<Item = MetricSample>) {
        for sample in samples {
            self.push(sample);
        }
    }
}

/// Producer of metric samples with an attach / detach lifecycle
pub trait SampleSource {
    fn name(&self) -> &'static str;

    /// A required source that fails to attach aborts `start_monitoring`.
    fn required(&self) -> bool {
        false
    }

    fn attach(&mut self, sink: SampleSink) -> Result<()>;

    /// Stop delivering. Must be synchronous and idempotent.
    fn detach(&mut self);
}

/// Every browser-backed source, in attach order
pub fn default_sources(
    environment: Rc<dyn crate::environment::Environment>,
) -> Vec<Box<dyn SampleSource>> {
    vec![
        Box::new(NavigationSource::new()),
        Box::new(PaintSource::new()),
        Box::new(LayoutShiftSource::new()),
        Box::new(InputLatencySource::new()),
        Box::new(NetworkSource::new(environment.clone())),
        Box::new(DeviceSource::new(environment)),
    ]
}

// ============================================================================
// Push source
// ============================================================================

/// Source fed by the host through a [`PushHandle`]: custom instrumentation,
/// the JS boundary, or tests.
pub struct PushSource {
    name: &'static str,
    required: bool,
    sink: Rc<RefCell<Option<SampleSink>>>,
}

/// Sending half of a [`PushSource`]. Samples pushed while the source is
/// detached are dropped.
#[derive(Clone)]
pub struct PushHandle {
    sink: Rc<RefCell<Option<SampleSink>>>,
}

impl PushSource {
    pub fn new(name: &'static str) -> (PushSource, PushHandle) {
        let sink = Rc::new(RefCell::new(None));
        (
            PushSource {
                name,
                required: false,
                sink: sink.clone(),
            },
            PushHandle { sink },
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl SampleSource for PushSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        *self.sink.borrow_mut() = Some(sink);
        Ok(())
    }

    fn detach(&mut self) {
        self.sink.borrow_mut().take();
    }
}

impl PushHandle {
    /// Returns `false` when the sample was dropped because nothing is attached.
    pub fn push(&self, sample: MetricSample) -> bool {
        // Clone out so delivery does not hold the borrow.
        let sink = self.sink.borrow().clone();
        match sink {
            Some(sink) => {
                sink.push(sample);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.borrow().is_some()
    }
}

// ============================================================================
// Failing source
// ============================================================================

/// Source that can never attach. Stands in for a capability the host declared
/// mandatory but the runtime lacks.
pub struct UnavailableSource {
    name: &'static str,
    required: bool,
}

impl UnavailableSource {
    pub fn new(name: &'static str, required: bool) -> Self {
        UnavailableSource { name, required }
    }
}

impl SampleSource for UnavailableSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn attach(&mut self, _sink: SampleSink) -> Result<()> {
        if self.required {
            Err(MonitorError::source_attach(self.name, "capability missing"))
        } else {
            Err(MonitorError::source_unavailable(self.name))
        }
    }

    fn detach(&mut self) {}
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn browser_only(name: &'static str) -> Result<()> {
    Err(MonitorError::source_unavailable(name))
}
