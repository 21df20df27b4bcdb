// Device capability source: memory and logical core count.

use std::rc::Rc;

use super::{SampleSink, SampleSource};
use crate::environment::Environment;
use crate::error::{MonitorError, Result};
use crate::metrics::MetricSample;

const SOURCE_NAME: &str = "device";

pub struct DeviceSource {
    environment: Rc<dyn Environment>,
}

impl DeviceSource {
    pub fn new(environment: Rc<dyn Environment>) -> Self {
        DeviceSource { environment }
    }
}

impl SampleSource for DeviceSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn attach(&mut self, sink: SampleSink) -> Result<()> {
        let memory = self.environment.device_memory();
        let cores = self.environment.hardware_concurrency();
        if memory.is_none() && cores.is_none() {
            return Err(MonitorError::source_unavailable(SOURCE_NAME));
        }

        if let Some(gb) = memory {
            sink.push(MetricSample::DeviceMemory(gb));
        }
        if let Some(cores) = cores {
            sink.push(MetricSample::HardwareConcurrency(cores));
        }
        Ok(())
    }

    fn detach(&mut self) {}
}
