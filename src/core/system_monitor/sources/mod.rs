//! Metric sources polled by the scheduler.
//!
//! Each subsystem (CPU, temperature, memory, disks, network, battery, GPU,
//! containers) is an independent `MetricSource`. Optional capabilities are
//! probed once in `probe_sources`; when a probe fails the slot is filled with
//! an `UnavailableSource` instead of scattering fallbacks through the engine.

mod battery;
mod containers;
mod cpu;
mod disks;
mod gpu;
mod memory;
mod network;
mod processes;
mod temperature;

pub use battery::{BatterySource, BATTERY_ID, BATTERY_PLUGGED_ID, BATTERY_TIME_LEFT_ID};
pub use containers::{
    parse_stats_line, ContainerSource, ContainerStats, CONTAINERS_ID, CONTAINER_CPU_FAMILY,
    CONTAINER_MEM_FAMILY,
};
pub use cpu::{CpuSource, CPU_CORE_FAMILY, CPU_FREQ_ID, CPU_ID, LOAD_AVG_FAMILY};
pub use disks::{DiskSource, DISK_FAMILY};
pub use gpu::{GpuSource, GPU_ID, GPU_MEMORY_ID, GPU_TEMP_ID};
pub use memory::{
    MemorySource, MEMORY_ID, MEMORY_TOTAL_ID, MEMORY_USED_ID, SWAP_ID, SWAP_TOTAL_ID, SWAP_USED_ID,
};
pub use network::{
    NetworkRateTracker, NetworkSource, NET_RX_FAMILY, NET_RX_TOTAL_ID, NET_TX_FAMILY,
    NET_TX_TOTAL_ID,
};
pub use processes::SysinfoProcessLister;
pub use temperature::{TemperatureSource, CPU_TEMP_ID};

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{CpuRefreshKind, RefreshKind, System};

use super::metrics::{HostInfo, MetricId, MetricSample, ProcessInfo, Unit};
use crate::core::config::DashboardConfig;
use crate::error::Result;

/// A provider of one subsystem's metrics, called once per tick from a blocking task.
pub trait MetricSource: Send + Sync {
    /// Primary metric id, also the key used when the whole source is unavailable.
    fn id(&self) -> MetricId;

    fn unit(&self) -> Unit;

    /// Read the current values. A source may return several samples
    /// (per core, per mount, per interface) and may mark some unavailable.
    fn sample(&self) -> Result<Vec<MetricSample>>;
}

/// Provides the process table captured alongside each tick.
pub trait ProcessLister: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessInfo>>;
}

/// Stub for an optional capability that is absent on this host.
pub struct UnavailableSource {
    id: MetricId,
    unit: Unit,
}

impl UnavailableSource {
    pub fn new(id: &str, unit: Unit) -> Self {
        Self {
            id: MetricId::new(id),
            unit,
        }
    }
}

impl MetricSource for UnavailableSource {
    fn id(&self) -> MetricId {
        self.id.clone()
    }

    fn unit(&self) -> Unit {
        self.unit
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        Ok(vec![MetricSample::unavailable(self.id.clone(), self.unit)])
    }
}

/// Build the source list for this host. Runs once at startup.
pub fn probe_sources(config: &DashboardConfig) -> Vec<Arc<dyn MetricSource>> {
    let mut sources: Vec<Arc<dyn MetricSource>> = vec![
        Arc::new(CpuSource::new()),
        Arc::new(MemorySource::new()),
        Arc::new(DiskSource::new()),
        Arc::new(NetworkSource::new()),
    ];

    match TemperatureSource::probe() {
        Ok(source) => sources.push(Arc::new(source)),
        Err(e) => {
            log::info!("CPU temperature unavailable: {}", e);
            sources.push(Arc::new(UnavailableSource::new(CPU_TEMP_ID, Unit::Celsius)));
        }
    }

    match BatterySource::probe() {
        Ok(source) => sources.push(Arc::new(source)),
        Err(e) => {
            log::info!("battery unavailable: {}", e);
            sources.push(Arc::new(UnavailableSource::new(battery::BATTERY_ID, Unit::Percent)));
        }
    }

    if config.enable_gpu {
        match GpuSource::probe() {
            Ok(source) => sources.push(Arc::new(source)),
            Err(e) => {
                log::info!("GPU unavailable: {}", e);
                sources.push(Arc::new(UnavailableSource::new(gpu::GPU_ID, Unit::Percent)));
            }
        }
    } else {
        sources.push(Arc::new(UnavailableSource::new(gpu::GPU_ID, Unit::Percent)));
    }

    if config.enable_containers {
        let command_timeout = Duration::from_millis(config.source_timeout_ms);
        match ContainerSource::probe(command_timeout) {
            Ok(source) => sources.push(Arc::new(source)),
            Err(e) => {
                log::info!("container runtime unavailable: {}", e);
                sources.push(Arc::new(UnavailableSource::new(
                    containers::CONTAINERS_ID,
                    Unit::Count,
                )));
            }
        }
    } else {
        sources.push(Arc::new(UnavailableSource::new(
            containers::CONTAINERS_ID,
            Unit::Count,
        )));
    }

    log::info!("{} metric sources configured", sources.len());
    sources
}

/// Collect static host information (hostname, OS, CPU brand, boot time)
pub fn collect_host_info() -> HostInfo {
    let system = System::new_with_specifics(
        RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()),
    );
    let cpus = system.cpus();

    HostInfo {
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        os_version: System::os_version().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        cpu_brand: cpus
            .first()
            .map(|c| c.brand().to_string())
            .unwrap_or_default(),
        core_count: cpus.len(),
        boot_time: System::boot_time() as i64,
    }
}

/// Percentage helper shared by the sysinfo-backed sources.
fn percent(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(part as f64 / total as f64 * 100.0)
}
