//! Alert system for monitoring critical conditions.
//!
//! Evaluates each new sample against its configured threshold, keeps one alert
//! level per metric, and appends to a bounded log only when a level changes.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{MetricId, MetricSample, Unit};

pub const DEFAULT_ALERT_LOG_SIZE: usize = 200;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Ok,
    Warning,
    Critical,
}

impl AlertLevel {
    /// One level closer to `Ok`.
    pub fn step_down(self) -> Self {
        match self {
            AlertLevel::Critical => AlertLevel::Warning,
            AlertLevel::Warning | AlertLevel::Ok => AlertLevel::Ok,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::Ok => "OK",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        };
        f.pad(label)
    }
}

/// Which side of the thresholds is the bad one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// e.g. CPU %: values at or above the threshold are worse
    #[default]
    HigherIsWorse,
    /// e.g. battery %: values at or below the threshold are worse
    LowerIsWorse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Exact metric id (`disk:/home`) or a whole family (`disk`)
    pub metric: MetricId,
    pub warning: f64,
    pub critical: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl Threshold {
    pub fn above(metric: &str, warning: f64, critical: f64) -> Self {
        Self {
            metric: MetricId::new(metric),
            warning,
            critical,
            direction: Direction::HigherIsWorse,
        }
    }

    pub fn below(metric: &str, warning: f64, critical: f64) -> Self {
        Self {
            metric: MetricId::new(metric),
            warning,
            critical,
            direction: Direction::LowerIsWorse,
        }
    }

    pub fn level_for(&self, value: f64) -> AlertLevel {
        match self.direction {
            Direction::HigherIsWorse => {
                if value >= self.critical {
                    AlertLevel::Critical
                } else if value >= self.warning {
                    AlertLevel::Warning
                } else {
                    AlertLevel::Ok
                }
            }
            Direction::LowerIsWorse => {
                if value <= self.critical {
                    AlertLevel::Critical
                } else if value <= self.warning {
                    AlertLevel::Warning
                } else {
                    AlertLevel::Ok
                }
            }
        }
    }

    /// Critical must lie beyond warning in the bad direction.
    pub fn is_consistent(&self) -> bool {
        if !self.warning.is_finite() || !self.critical.is_finite() {
            return false;
        }
        match self.direction {
            Direction::HigherIsWorse => self.warning <= self.critical,
            Direction::LowerIsWorse => self.warning >= self.critical,
        }
    }

    fn limit_for(&self, level: AlertLevel) -> f64 {
        match level {
            AlertLevel::Critical => self.critical,
            AlertLevel::Warning | AlertLevel::Ok => self.warning,
        }
    }
}

/// Thresholds keyed by metric id; lookups fall back from the exact id to its family.
#[derive(Debug, Clone, Default)]
pub struct ThresholdSet {
    by_metric: HashMap<MetricId, Threshold>,
}

impl ThresholdSet {
    pub fn new<I: IntoIterator<Item = Threshold>>(thresholds: I) -> Self {
        let by_metric = thresholds
            .into_iter()
            .map(|t| (t.metric.clone(), t))
            .collect();
        Self { by_metric }
    }

    pub fn lookup(&self, metric_id: &MetricId) -> Option<&Threshold> {
        self.by_metric
            .get(metric_id.as_str())
            .or_else(|| self.by_metric.get(metric_id.family()))
    }

    pub fn len(&self) -> usize {
        self.by_metric.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_metric.is_empty()
    }

    /// Sorted by metric id.
    pub fn to_vec(&self) -> Vec<Threshold> {
        let mut all: Vec<_> = self.by_metric.values().cloned().collect();
        all.sort_by(|a, b| a.metric.cmp(&b.metric));
        all
    }
}

/// A recorded level transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub metric_id: MetricId,
    pub from_level: AlertLevel,
    pub to_level: AlertLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl AlertEvent {
    pub fn is_escalation(&self) -> bool {
        self.to_level > self.from_level
    }
}

/// Per-metric alert state machine with a transition-only, bounded log.
#[derive(Debug)]
pub struct AlertEngine {
    thresholds: ThresholdSet,
    levels: HashMap<MetricId, AlertLevel>,
    log: VecDeque<AlertEvent>,
    log_capacity: usize,
    log_view: Arc<[AlertEvent]>,
}

impl AlertEngine {
    pub fn new(thresholds: ThresholdSet) -> Self {
        Self::with_log_capacity(thresholds, DEFAULT_ALERT_LOG_SIZE)
    }

    pub fn with_log_capacity(thresholds: ThresholdSet, log_capacity: usize) -> Self {
        let log_capacity = log_capacity.max(1);
        Self {
            thresholds,
            levels: HashMap::new(),
            log: VecDeque::with_capacity(log_capacity),
            log_capacity,
            log_view: Arc::from(Vec::new()),
        }
    }

    /// Evaluate one sample. Returns the event when the level changed.
    ///
    /// Escalation jumps straight to the level the value reaches; recovery steps
    /// down one level per sample, so CRITICAL passes through WARNING on its way
    /// back to OK. Unavailable samples and metrics without a threshold never
    /// change state. A metric that has not been seen yet starts at `AlertLevel::Ok`.
    pub fn evaluate(&mut self, sample: &MetricSample) -> Option<AlertEvent> {
        let value = sample.value.filter(|v| v.is_finite())?;
        let threshold = self.thresholds.lookup(&sample.metric_id)?;

        let current = self
            .levels
            .entry(sample.metric_id.clone())
            .or_insert(AlertLevel::Ok);
        let new_level = next_level(*current, threshold.level_for(value));
        if *current == new_level {
            return None;
        }

        let from_level = *current;
        *current = new_level;

        let event = AlertEvent {
            metric_id: sample.metric_id.clone(),
            from_level,
            to_level: new_level,
            timestamp: sample.timestamp,
            message: describe(&sample.metric_id, value, sample.unit, threshold, from_level, new_level),
        };

        if event.is_escalation() {
            log::warn!("alert {} {} -> {}: {}", event.metric_id, from_level, new_level, event.message);
        } else {
            log::info!("alert {} {} -> {}: {}", event.metric_id, from_level, new_level, event.message);
        }

        if self.log.len() >= self.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(event.clone());
        self.log_view = self.log.iter().cloned().collect();

        Some(event)
    }

    /// Current level of a metric, if it has a threshold and was ever sampled.
    pub fn level(&self, metric_id: &str) -> Option<AlertLevel> {
        self.levels.get(metric_id).copied()
    }

    /// Drop the state of a metric that is no longer reported. Logged events stay.
    pub fn forget(&mut self, metric_id: &str) {
        self.levels.remove(metric_id);
    }

    pub fn levels(&self) -> impl Iterator<Item = (&MetricId, AlertLevel)> {
        self.levels.iter().map(|(id, level)| (id, *level))
    }

    /// Oldest first. Cheap to clone; rebuilt only when an event is appended.
    pub fn log(&self) -> Arc<[AlertEvent]> {
        Arc::clone(&self.log_view)
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }
}

fn next_level(current: AlertLevel, measured: AlertLevel) -> AlertLevel {
    if measured >= current {
        measured
    } else {
        current.step_down().max(measured)
    }
}

fn describe(
    metric_id: &MetricId,
    value: f64,
    unit: Unit,
    threshold: &Threshold,
    from: AlertLevel,
    to: AlertLevel,
) -> String {
    let suffix = unit.suffix();
    let limit = threshold.limit_for(to);
    match to {
        AlertLevel::Critical => format!(
            "{} at {:.1}{} (critical threshold: {:.1}{})",
            metric_id, value, suffix, limit, suffix
        ),
        AlertLevel::Warning if from > to => format!(
            "{} easing at {:.1}{}, was {} (critical threshold: {:.1}{})",
            metric_id, value, suffix, from, threshold.critical, suffix
        ),
        AlertLevel::Warning => format!(
            "{} at {:.1}{} (warning threshold: {:.1}{})",
            metric_id, value, suffix, limit, suffix
        ),
        AlertLevel::Ok => format!(
            "{} back to normal at {:.1}{} (warning threshold: {:.1}{})",
            metric_id, value, suffix, limit, suffix
        ),
    }
}
