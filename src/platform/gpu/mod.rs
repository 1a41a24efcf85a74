//! GPU-specific platform code.
//!
//! Provides GPU metrics collection for supported vendors.
//! NVIDIA is supported through NVML when the `nvml` feature is enabled.

mod nvidia;

pub use nvidia::NvidiaGpuProvider;

use crate::core::system_monitor::GpuProvider;
use crate::error::{DashError, Result};

/// Attempt to get an available GPU provider
///
/// Returns error if no supported GPU is available.
pub fn get_gpu_provider() -> Result<Box<dyn GpuProvider>> {
    match NvidiaGpuProvider::new() {
        Ok(provider) => Ok(Box::new(provider)),
        Err(e) => {
            log::debug!("NVIDIA probe failed: {}", e);
            Err(DashError::gpu_not_available("No supported GPU found"))
        }
    }
}
