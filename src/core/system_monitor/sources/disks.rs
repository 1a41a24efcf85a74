//! Disk usage source, one metric per mount point.

use parking_lot::Mutex;
use sysinfo::Disks;

use super::{percent, MetricSource};
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::{DashError, Result};

pub const DISK_FAMILY: &str = "disk";

pub struct DiskSource {
    disks: Mutex<Disks>,
}

impl DiskSource {
    pub fn new() -> Self {
        Self {
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for DiskSource {
    fn id(&self) -> MetricId {
        MetricId::new(DISK_FAMILY)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut disks = self.disks.lock();
        // Pick up mounts that appeared since the last tick
        disks.refresh(true);

        let samples: Vec<_> = disks
            .iter()
            .filter_map(|disk| {
                let total = disk.total_space();
                let used = total.saturating_sub(disk.available_space());
                let mount = disk.mount_point().to_string_lossy();
                percent(used, total).map(|value| {
                    MetricSample::new(MetricId::instance(DISK_FAMILY, mount), value, Unit::Percent)
                })
            })
            .collect();

        if samples.is_empty() {
            return Err(DashError::metric_collection("no mounted disks reported"));
        }
        Ok(samples)
    }
}
