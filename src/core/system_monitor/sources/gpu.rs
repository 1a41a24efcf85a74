//! GPU source, wrapping a vendor `GpuProvider` from the platform layer.

use parking_lot::Mutex;

use super::MetricSource;
use crate::core::system_monitor::gpu::GpuProvider;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::Result;
use crate::platform::get_gpu_provider;

pub const GPU_ID: &str = "gpu";
pub const GPU_MEMORY_ID: &str = "gpu_memory";
pub const GPU_TEMP_ID: &str = "gpu_temp";

pub struct GpuSource {
    provider: Mutex<Box<dyn GpuProvider>>,
}

impl GpuSource {
    pub fn new(provider: Box<dyn GpuProvider>) -> Self {
        Self {
            provider: Mutex::new(provider),
        }
    }

    pub fn probe() -> Result<Self> {
        let provider = get_gpu_provider()?;
        log::info!("GPU provider selected: {:?}", provider.vendor());
        Ok(Self::new(provider))
    }
}

impl MetricSource for GpuSource {
    fn id(&self) -> MetricId {
        MetricId::new(GPU_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let metrics = self.provider.lock().collect_metrics()?;

        let memory = match metrics.memory_percent() {
            Some(value) => MetricSample::new(MetricId::new(GPU_MEMORY_ID), value, Unit::Percent),
            None => MetricSample::unavailable(MetricId::new(GPU_MEMORY_ID), Unit::Percent),
        };
        let temperature = match metrics.temperature_celsius {
            Some(value) => MetricSample::new(MetricId::new(GPU_TEMP_ID), value as f64, Unit::Celsius),
            None => MetricSample::unavailable(MetricId::new(GPU_TEMP_ID), Unit::Celsius),
        };

        Ok(vec![
            MetricSample::new(self.id(), metrics.utilization_percent as f64, Unit::Percent),
            memory,
            temperature,
        ])
    }
}
