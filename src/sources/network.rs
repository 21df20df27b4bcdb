// Network information source. Reads `navigator.connection` once on attach.

use std::rc::Rc;

use super::{SampleSink, SampleSource};
use crate::environment::{ConnectionInfo, Environment};
use crate::error::{MonitorError, Result};
use crate::metrics::MetricSample;

const SOURCE_NAME: &str = "network";

pub fn connection_samples(info: &ConnectionInfo) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    if let Some(kind) = &info.connection_type {
        samples.push(MetricSample::ConnectionType(kind.clone()));
    }
    if let Some(effective) = &info.effective_type {
        samples.push(MetricSample::EffectiveType(effective.clone()));
    }
    if let Some(downlink) = info.downlink {
        samples.push(MetricSample::Downlink(downlink));
    }
    if let Some(rtt) = info.rtt {
        samples.push(MetricSample::Rtt(rtt));
    }
    samples
}

pub struct NetworkSource {
    environment: Rc<dyn Environment>,
}

impl NetworkSource {
    pub fn new(environment: Rc<dyn Environment>) -> Self {
        NetworkSource { environment }
    }
}

impl SampleSource for NetworkSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        let info = self
            .environment
            .connection()
            .ok_or_else(|| MonitorError::source_unavailable(SOURCE_NAME))?;
        sink.push_all(connection_samples(&info));
        Ok(())
    }

    fn detach(&mut self) {}
}
