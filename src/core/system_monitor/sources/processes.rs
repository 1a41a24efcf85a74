//! Process table provider.

use parking_lot::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use super::ProcessLister;
use crate::core::system_monitor::metrics::ProcessInfo;
use crate::error::Result;

/// Lists every process; ordering and truncation are left to the view.
pub struct SysinfoProcessLister {
    system: Mutex<System>,
}

impl SysinfoProcessLister {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_memory(sysinfo::MemoryRefreshKind::nothing().with_ram())
                .with_processes(ProcessRefreshKind::nothing().with_cpu().with_memory()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProcessLister {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLister for SysinfoProcessLister {
    fn list(&self) -> Result<Vec<ProcessInfo>> {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        let total_memory = system.total_memory();
        let processes = system
            .processes()
            .values()
            .map(|proc| {
                let mem = proc.memory();
                ProcessInfo {
                    pid: proc.pid().as_u32(),
                    name: proc.name().to_string_lossy().to_string(),
                    cpu_usage_percent: proc.cpu_usage(),
                    memory_bytes: mem,
                    memory_percent: if total_memory > 0 {
                        (mem as f32 / total_memory as f32) * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        Ok(processes)
    }
}
