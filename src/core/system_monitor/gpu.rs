use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Trait for GPU metrics providers
///
/// This trait abstracts GPU monitoring across different vendors.
/// Implementations are provided in the platform layer.
pub trait GpuProvider: Send {
    /// Get the vendor of the GPU
    fn vendor(&self) -> GpuVendor;

    /// Collect current GPU metrics
    fn collect_metrics(&mut self) -> Result<GpuMetrics>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuMetrics {
    pub vendor: GpuVendor,
    pub name: String,
    pub utilization_percent: u32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: Option<u32>,
}

impl GpuMetrics {
    pub fn memory_percent(&self) -> Option<f64> {
        if self.memory_total_bytes == 0 {
            return None;
        }
        Some(self.memory_used_bytes as f64 / self.memory_total_bytes as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    #[default]
    Unknown,
}
