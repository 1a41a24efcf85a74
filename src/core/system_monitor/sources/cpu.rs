//! CPU usage source (aggregate and per core), plus clock speed and load average.

use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, LoadAvg, RefreshKind, System};

use super::MetricSource;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::Result;

pub const CPU_ID: &str = "cpu";
pub const CPU_CORE_FAMILY: &str = "cpu_core";
pub const CPU_FREQ_ID: &str = "cpu_freq";
/// `load_avg:1`, `load_avg:5` and `load_avg:15`
pub const LOAD_AVG_FAMILY: &str = "load_avg";

pub struct CpuSource {
    system: Mutex<System>,
}

impl CpuSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(refresh_kind()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

fn refresh_kind() -> CpuRefreshKind {
    CpuRefreshKind::nothing().with_cpu_usage().with_frequency()
}

/// Mean clock across cores in MHz; `None` when the platform reports no frequency.
pub fn average_frequency(frequencies_mhz: &[u64]) -> Option<f64> {
    let known: Vec<u64> = frequencies_mhz.iter().copied().filter(|f| *f > 0).collect();
    if known.is_empty() {
        return None;
    }
    Some(known.iter().sum::<u64>() as f64 / known.len() as f64)
}

fn load_samples(load: LoadAvg) -> Vec<MetricSample> {
    [(1, load.one), (5, load.five), (15, load.fifteen)]
        .into_iter()
        .map(|(minutes, value)| {
            let id = MetricId::instance(LOAD_AVG_FAMILY, minutes);
            // Windows has no load average; sysinfo reports zeros there
            if cfg!(windows) {
                MetricSample::unavailable(id, Unit::Count)
            } else {
                MetricSample::new(id, value, Unit::Count)
            }
        })
        .collect()
}

impl MetricSource for CpuSource {
    fn id(&self) -> MetricId {
        MetricId::new(CPU_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut system = self.system.lock();
        // Usage is the delta since the previous refresh
        system.refresh_cpu_specifics(refresh_kind());

        let cpus = system.cpus();
        let mut samples = Vec::with_capacity(cpus.len() + 5);
        samples.push(MetricSample::new(
            self.id(),
            system.global_cpu_usage() as f64,
            Unit::Percent,
        ));
        samples.extend(cpus.iter().enumerate().map(|(i, cpu)| {
            MetricSample::new(
                MetricId::instance(CPU_CORE_FAMILY, i),
                cpu.cpu_usage() as f64,
                Unit::Percent,
            )
        }));

        let frequencies: Vec<u64> = cpus.iter().map(|cpu| cpu.frequency()).collect();
        let freq_id = MetricId::new(CPU_FREQ_ID);
        samples.push(match average_frequency(&frequencies) {
            Some(mhz) => MetricSample::new(freq_id, mhz, Unit::Megahertz),
            None => MetricSample::unavailable(freq_id, Unit::Megahertz),
        });

        samples.extend(load_samples(System::load_average()));
        Ok(samples)
    }
}
