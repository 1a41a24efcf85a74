use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::system_monitor::{
    clamp_interval, PanelId, SchedulerOptions, SessionState, SortKey, Threshold, ThresholdSet,
    DEFAULT_ALERT_LOG_SIZE, DEFAULT_HISTORY_SIZE,
};
use crate::error::{DashError, Result};

pub const DEFAULT_TOP_PROCESSES: usize = 15;
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 2000;

/// Persistent dashboard settings, stored as JSON under the user config dir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub update_interval_ms: u64,
    pub thresholds: Vec<Threshold>,
    pub visible_panels: BTreeSet<PanelId>,
    pub default_sort_key: SortKey,
    pub history_capacity: usize,
    pub alert_log_capacity: usize,
    pub source_timeout_ms: u64,
    /// Rows shown in the process table
    pub top_processes: usize,
    pub enable_gpu: bool,
    pub enable_containers: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let session = SessionState::default();
        Self {
            update_interval_ms: session.poll_interval_ms,
            thresholds: default_thresholds(),
            visible_panels: session.visible_panels,
            default_sort_key: session.sort_key,
            history_capacity: DEFAULT_HISTORY_SIZE,
            alert_log_capacity: DEFAULT_ALERT_LOG_SIZE,
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            top_processes: DEFAULT_TOP_PROCESSES,
            enable_gpu: true,
            enable_containers: true,
        }
    }
}

fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::above("cpu", 75.0, 90.0),
        Threshold::above("memory", 80.0, 95.0),
        Threshold::above("swap", 80.0, 95.0),
        Threshold::above("disk", 85.0, 95.0),
        Threshold::above("gpu", 80.0, 95.0),
        Threshold::above("gpu_memory", 80.0, 95.0),
        Threshold::above("gpu_temp", 75.0, 90.0),
        Threshold::above("cpu_temp", 70.0, 85.0),
        Threshold::below("battery", 20.0, 10.0),
        Threshold::above("container_cpu", 80.0, 95.0),
    ]
}

impl DashboardConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Read a config file. A missing, empty, unreadable or malformed file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("cannot read config {:?}, using defaults: {}", path, e);
                return Ok(Self::default());
            }
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = match serde_json::from_str::<Self>(&data) {
            Ok(config) => config.sanitized(),
            Err(e) => {
                // Format changed or file was hand-edited badly
                log::warn!("ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }
        };
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        log::debug!("config saved to {:?}", path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DashError::config("Could not determine config directory"))?;

        Ok(config_dir.join("sysdash").join("config.json"))
    }

    /// Clamp out-of-range values and drop contradictory thresholds.
    pub fn sanitized(mut self) -> Self {
        let clamped = clamp_interval(self.update_interval_ms);
        if clamped != self.update_interval_ms {
            log::warn!(
                "update interval {}ms out of range, using {}ms",
                self.update_interval_ms,
                clamped
            );
            self.update_interval_ms = clamped;
        }

        if self.history_capacity == 0 {
            self.history_capacity = DEFAULT_HISTORY_SIZE;
        }
        if self.alert_log_capacity == 0 {
            self.alert_log_capacity = DEFAULT_ALERT_LOG_SIZE;
        }
        if self.source_timeout_ms == 0 {
            self.source_timeout_ms = DEFAULT_SOURCE_TIMEOUT_MS;
        }

        self.thresholds.retain(|threshold| {
            let keep = threshold.is_consistent();
            if !keep {
                log::warn!(
                    "dropping threshold for {}: warning {} and critical {} disagree with direction {:?}",
                    threshold.metric,
                    threshold.warning,
                    threshold.critical,
                    threshold.direction
                );
            }
            keep
        });
        self
    }

    /// Initial session for a dashboard started from this config.
    pub fn session(&self) -> SessionState {
        SessionState {
            poll_interval_ms: clamp_interval(self.update_interval_ms),
            visible_panels: self.visible_panels.clone(),
            sort_key: self.default_sort_key,
            ..SessionState::default()
        }
    }

    /// Copy with the user-adjustable parts taken from a live session.
    pub fn with_session(&self, session: &SessionState) -> Self {
        Self {
            update_interval_ms: session.poll_interval_ms,
            visible_panels: session.visible_panels.clone(),
            default_sort_key: session.sort_key,
            ..self.clone()
        }
    }

    pub fn threshold_set(&self) -> ThresholdSet {
        ThresholdSet::new(self.thresholds.iter().cloned())
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            history_capacity: self.history_capacity,
            alert_log_capacity: self.alert_log_capacity,
            source_timeout: Duration::from_millis(self.source_timeout_ms),
        }
    }
}
