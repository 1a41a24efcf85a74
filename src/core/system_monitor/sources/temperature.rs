//! CPU temperature from the platform's thermal sensors.

use parking_lot::Mutex;
use sysinfo::Components;

use super::MetricSource;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::{DashError, Result};

pub const CPU_TEMP_ID: &str = "cpu_temp";

// Sensor labels as reported by coretemp, k10temp, cpu_thermal and macOS SMC
const CPU_SENSOR_HINTS: &[&str] = &["coretemp", "k10temp", "cpu", "package", "tctl", "tdie"];

pub struct TemperatureSource {
    components: Mutex<Components>,
}

impl TemperatureSource {
    /// Succeeds only when some sensor looks like a CPU sensor.
    pub fn probe() -> Result<Self> {
        let components = Components::new_with_refreshed_list();
        if cpu_temperature(readings(&components)).is_none() {
            return Err(DashError::source_unavailable("no CPU temperature sensor"));
        }
        Ok(Self {
            components: Mutex::new(components),
        })
    }
}

fn readings(components: &Components) -> impl Iterator<Item = (&str, Option<f32>)> + '_ {
    components
        .iter()
        .map(|component| (component.label(), component.temperature()))
}

/// Hottest reading among CPU-labelled sensors.
pub fn cpu_temperature<'a>(readings: impl IntoIterator<Item = (&'a str, Option<f32>)>) -> Option<f64> {
    readings
        .into_iter()
        .filter(|(label, _)| {
            let label = label.to_lowercase();
            CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint))
        })
        .filter_map(|(_, celsius)| celsius.filter(|c| c.is_finite() && *c > 0.0))
        .map(f64::from)
        .reduce(f64::max)
}

impl MetricSource for TemperatureSource {
    fn id(&self) -> MetricId {
        MetricId::new(CPU_TEMP_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Celsius
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut components = self.components.lock();
        components.refresh(true);

        let sample = match cpu_temperature(readings(&components)) {
            Some(celsius) => MetricSample::new(self.id(), celsius, Unit::Celsius),
            None => MetricSample::unavailable(self.id(), Unit::Celsius),
        };
        Ok(vec![sample])
    }
}
