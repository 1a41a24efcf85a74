//! Battery charge source, with charger state and estimated time left.

use battery::units::ratio::percent;
use battery::units::time::second;
use battery::State;

use super::MetricSource;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::{DashError, Result};

pub const BATTERY_ID: &str = "battery";
/// 1 while on external power, 0 while discharging
pub const BATTERY_PLUGGED_ID: &str = "battery_plugged";
/// Seconds to empty when discharging, to full when charging
pub const BATTERY_TIME_LEFT_ID: &str = "battery_time_left";

/// Reads the first battery reported by the OS.
///
/// `battery::Manager` is created per read; on every supported platform that is
/// a cheap handle and it keeps the source `Send + Sync`.
pub struct BatterySource;

impl BatterySource {
    /// Succeeds only when at least one battery is present.
    pub fn probe() -> Result<Self> {
        let manager = battery::Manager::new()
            .map_err(|e| DashError::source_unavailable(format!("battery manager: {}", e)))?;
        let mut batteries = manager
            .batteries()
            .map_err(|e| DashError::source_unavailable(format!("battery list: {}", e)))?;
        match batteries.next() {
            Some(Ok(_)) => Ok(Self),
            Some(Err(e)) => Err(DashError::source_unavailable(format!("battery: {}", e))),
            None => Err(DashError::source_unavailable("no battery present")),
        }
    }
}

/// Whether the charger is connected; `None` when the controller does not say.
pub fn plugged_in(state: State) -> Option<bool> {
    match state {
        State::Charging | State::Full => Some(true),
        State::Discharging | State::Empty => Some(false),
        _ => None,
    }
}

fn battery_samples(battery: &battery::Battery) -> Vec<MetricSample> {
    let state = battery.state();
    let charge = MetricSample::new(
        MetricId::new(BATTERY_ID),
        battery.state_of_charge().get::<percent>() as f64,
        Unit::Percent,
    );

    let plugged_id = MetricId::new(BATTERY_PLUGGED_ID);
    let plugged = match plugged_in(state) {
        Some(on_power) => MetricSample::new(plugged_id, f64::from(u8::from(on_power)), Unit::Count),
        None => MetricSample::unavailable(plugged_id, Unit::Count),
    };

    let time_left = match state {
        State::Charging => battery.time_to_full(),
        State::Discharging => battery.time_to_empty(),
        _ => None,
    };
    let time_left_id = MetricId::new(BATTERY_TIME_LEFT_ID);
    let time_left = match time_left {
        Some(time) => MetricSample::new(time_left_id, time.get::<second>() as f64, Unit::Seconds),
        None => MetricSample::unavailable(time_left_id, Unit::Seconds),
    };

    vec![charge, plugged, time_left]
}

impl MetricSource for BatterySource {
    fn id(&self) -> MetricId {
        MetricId::new(BATTERY_ID)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let manager = battery::Manager::new()
            .map_err(|e| DashError::metric_collection(format!("battery manager: {}", e)))?;
        let first = manager
            .batteries()
            .map_err(|e| DashError::metric_collection(format!("battery list: {}", e)))?
            .next();

        match first {
            Some(Ok(battery)) => Ok(battery_samples(&battery)),
            Some(Err(e)) => Err(DashError::metric_collection(format!("battery: {}", e))),
            // Battery removed since startup
            None => Ok(vec![MetricSample::unavailable(self.id(), Unit::Percent)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugged_in_from_state() {
        assert_eq!(plugged_in(State::Charging), Some(true));
        assert_eq!(plugged_in(State::Full), Some(true));
        assert_eq!(plugged_in(State::Discharging), Some(false));
        assert_eq!(plugged_in(State::Empty), Some(false));
        assert_eq!(plugged_in(State::Unknown), None);
    }
}
