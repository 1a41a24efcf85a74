//! RAM and swap usage source, as percentages and as byte counts.

use parking_lot::Mutex;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use super::{percent, MetricSource};
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::{DashError, Result};

pub const MEMORY_ID: &str = "memory";
pub const SWAP_ID: &str = "swap";
pub const MEMORY_USED_ID: &str = "memory_used";
pub const MEMORY_TOTAL_ID: &str = "memory_total";
pub const SWAP_USED_ID: &str = "swap_used";
pub const SWAP_TOTAL_ID: &str = "swap_total";

pub struct MemorySource {
    system: Mutex<System>,
}

impl MemorySource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for MemorySource {
    fn id(&self) -> MetricId {
        MetricId::new(MEMORY_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let memory = percent(system.used_memory(), system.total_memory())
            .ok_or_else(|| DashError::metric_collection("total memory reported as zero"))?;

        // No swap configured is not an error, just nothing to show
        let swap = match percent(system.used_swap(), system.total_swap()) {
            Some(value) => MetricSample::new(MetricId::new(SWAP_ID), value, Unit::Percent),
            None => MetricSample::unavailable(MetricId::new(SWAP_ID), Unit::Percent),
        };

        let bytes = |id: &str, value: u64| {
            MetricSample::new(MetricId::new(id), value as f64, Unit::Bytes)
        };
        Ok(vec![
            MetricSample::new(self.id(), memory, Unit::Percent),
            swap,
            bytes(MEMORY_USED_ID, system.used_memory()),
            bytes(MEMORY_TOTAL_ID, system.total_memory()),
            bytes(SWAP_USED_ID, system.used_swap()),
            bytes(SWAP_TOTAL_ID, system.total_swap()),
        ])
    }
}
