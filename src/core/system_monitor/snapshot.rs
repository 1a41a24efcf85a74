use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alerts::{AlertEvent, AlertLevel};
use super::history::HistorySeries;
use super::metrics::{HostInfo, MetricId, MetricSample, ProcessInfo};
use super::session::SortKey;

/// Point-in-time view of everything the scheduler knows, published once per tick.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub host: Arc<HostInfo>,
    pub samples: BTreeMap<MetricId, MetricSample>,
    pub histories: BTreeMap<MetricId, Arc<HistorySeries>>,
    pub alert_levels: BTreeMap<MetricId, AlertLevel>,
    /// Oldest first
    pub alert_log: Arc<[AlertEvent]>,
    pub processes: Arc<[ProcessInfo]>,
}

impl Snapshot {
    /// The empty snapshot readers see before the first tick completes.
    pub fn empty(host: Arc<HostInfo>) -> Self {
        Self {
            sequence: 0,
            taken_at: Utc::now(),
            host,
            samples: BTreeMap::new(),
            histories: BTreeMap::new(),
            alert_levels: BTreeMap::new(),
            alert_log: Arc::from(Vec::new()),
            processes: Arc::from(Vec::new()),
        }
    }

    pub fn sample(&self, metric_id: &str) -> Option<&MetricSample> {
        self.samples.get(metric_id)
    }

    /// `None` when the metric is missing or unavailable.
    pub fn value(&self, metric_id: &str) -> Option<f64> {
        self.sample(metric_id).and_then(|s| s.value)
    }

    pub fn is_unavailable(&self, metric_id: &str) -> bool {
        !self.sample(metric_id).is_some_and(|s| s.is_available())
    }

    pub fn history(&self, metric_id: &str) -> Option<&HistorySeries> {
        self.histories.get(metric_id).map(|h| h.as_ref())
    }

    pub fn alert_level(&self, metric_id: &str) -> AlertLevel {
        self.alert_levels.get(metric_id).copied().unwrap_or_default()
    }

    /// Highest level across all metrics.
    pub fn worst_level(&self) -> AlertLevel {
        self.alert_levels.values().copied().max().unwrap_or_default()
    }

    /// Samples of one family, ordered by id (e.g. all `disk:*`).
    pub fn family<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a MetricSample> + 'a {
        self.samples
            .values()
            .filter(move |s| s.metric_id.family() == family)
    }

    /// Newest first.
    pub fn recent_alerts(&self, limit: usize) -> impl Iterator<Item = &AlertEvent> {
        self.alert_log.iter().rev().take(limit)
    }

    pub fn processes_sorted(&self, key: SortKey, limit: usize) -> Vec<ProcessInfo> {
        let mut processes = self.processes.to_vec();
        processes.sort_by(|a, b| compare_processes(a, b, key));
        processes.truncate(limit);
        processes
    }
}

fn compare_processes(a: &ProcessInfo, b: &ProcessInfo, key: SortKey) -> Ordering {
    match key {
        SortKey::Cpu => b
            .cpu_usage_percent
            .partial_cmp(&a.cpu_usage_percent)
            .unwrap_or(Ordering::Equal)
            .then(a.pid.cmp(&b.pid)),
        SortKey::Memory => b.memory_bytes.cmp(&a.memory_bytes).then(a.pid.cmp(&b.pid)),
        SortKey::Pid => a.pid.cmp(&b.pid),
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.pid.cmp(&b.pid)),
    }
}

/// Holds the latest published snapshot.
///
/// Publication swaps the whole `Arc`, so a reader gets either the previous or
/// the next complete snapshot and never waits on the writer.
#[derive(Debug, Clone)]
pub struct SnapshotCell {
    inner: Arc<ArcSwap<Snapshot>>,
}

impl SnapshotCell {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        self.inner.store(snapshot);
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }
}
