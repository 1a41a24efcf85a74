use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::metrics::{MetricId, MetricSample};

pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Circular buffer of recent values for one metric (for sparklines)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    capacity: usize,
    values: VecDeque<f64>,
}

impl HistorySeries {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Convert to u64 values for the sparkline widget.
    /// Scales values by 10 to preserve one decimal of precision.
    pub fn as_u64(&self) -> Vec<u64> {
        self.values
            .iter()
            .map(|&v| (v.max(0.0) * 10.0) as u64)
            .collect()
    }
}

/// A series plus the copy last handed to a snapshot, if still current.
#[derive(Debug, Clone)]
struct TrackedSeries {
    series: HistorySeries,
    published: Option<Arc<HistorySeries>>,
}

/// One bounded series per tracked metric.
///
/// `append` works in place on the owned ring. Snapshots get an immutable copy
/// through `publish`, which copies only series appended to since the previous
/// publish; an unchanged series keeps sharing the copy it already handed out.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    series: HashMap<MetricId, TrackedSeries>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    pub fn append(&mut self, metric_id: &MetricId, value: f64) {
        let capacity = self.capacity;
        let tracked = self
            .series
            .entry(metric_id.clone())
            .or_insert_with(|| TrackedSeries {
                series: HistorySeries::with_capacity(capacity),
                published: None,
            });
        tracked.series.push(value);
        tracked.published = None;
    }

    /// Record a sample; unavailable samples leave the series untouched.
    pub fn record(&mut self, sample: &MetricSample) {
        if let Some(value) = sample.value {
            self.append(&sample.metric_id, value);
        }
    }

    pub fn remove(&mut self, metric_id: &str) -> Option<HistorySeries> {
        self.series.remove(metric_id).map(|tracked| tracked.series)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, metric_id: &str) -> Option<&HistorySeries> {
        self.series.get(metric_id).map(|tracked| &tracked.series)
    }

    /// Immutable views of every series for a snapshot.
    ///
    /// Costs one copy of each series changed since the last call and one `Arc`
    /// clone for the rest.
    pub fn publish(&mut self) -> BTreeMap<MetricId, Arc<HistorySeries>> {
        self.series
            .iter_mut()
            .map(|(id, tracked)| {
                let view = tracked
                    .published
                    .get_or_insert_with(|| Arc::new(tracked.series.clone()));
                (id.clone(), Arc::clone(view))
            })
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}
