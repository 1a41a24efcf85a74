//! Network throughput source, rates derived from counter deltas.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use sysinfo::Networks;

use super::MetricSource;
use crate::core::system_monitor::metrics::{MetricId, MetricSample, Unit};
use crate::error::Result;

pub const NET_RX_FAMILY: &str = "net_rx";
pub const NET_TX_FAMILY: &str = "net_tx";
/// Sum over all interfaces, tracked for the throughput trend
pub const NET_RX_TOTAL_ID: &str = "net_rx_total";
pub const NET_TX_TOTAL_ID: &str = "net_tx_total";

/// Per-interface byte counters between two reads.
///
/// The first observation of an interface yields a rate of 0; a counter that
/// went backwards (interface reset) also yields 0.
#[derive(Debug, Default)]
pub struct NetworkRateTracker {
    last_update: Option<Instant>,
    last_values: HashMap<String, (u64, u64)>, // (rx, tx) per interface
}

impl NetworkRateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(interface, rx_bytes_per_sec, tx_bytes_per_sec)` sorted by interface.
    pub fn update(
        &mut self,
        now: Instant,
        counters: impl IntoIterator<Item = (String, u64, u64)>,
    ) -> Vec<(String, f64, f64)> {
        let elapsed_secs = self
            .last_update
            .map(|t| now.duration_since(t).as_secs_f64())
            .filter(|secs| *secs > 0.0);

        let mut current = HashMap::new();
        let mut rates: Vec<_> = counters
            .into_iter()
            .map(|(name, rx, tx)| {
                let rate = match (self.last_values.get(&name), elapsed_secs) {
                    (Some(&(prev_rx, prev_tx)), Some(secs)) => (
                        rx.saturating_sub(prev_rx) as f64 / secs,
                        tx.saturating_sub(prev_tx) as f64 / secs,
                    ),
                    _ => (0.0, 0.0),
                };
                current.insert(name.clone(), (rx, tx));
                (name, rate.0, rate.1)
            })
            .collect();

        self.last_update = Some(now);
        self.last_values = current;

        rates.sort_by(|a, b| a.0.cmp(&b.0));
        rates
    }
}

pub struct NetworkSource {
    state: Mutex<(Networks, NetworkRateTracker)>,
}

impl NetworkSource {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let mut tracker = NetworkRateTracker::new();
        // Seed the tracker so the first tick already has a baseline
        tracker.update(Instant::now(), counters(&networks));
        Self {
            state: Mutex::new((networks, tracker)),
        }
    }
}

impl Default for NetworkSource {
    fn default() -> Self {
        Self::new()
    }
}

fn counters(networks: &Networks) -> Vec<(String, u64, u64)> {
    networks
        .iter()
        .map(|(name, data)| (name.to_string(), data.total_received(), data.total_transmitted()))
        .collect()
}

impl MetricSource for NetworkSource {
    fn id(&self) -> MetricId {
        MetricId::new("network")
    }

    fn unit(&self) -> Unit {
        Unit::BytesPerSec
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut guard = self.state.lock();
        let (networks, tracker) = &mut *guard;
        networks.refresh(true);

        let rates = tracker.update(Instant::now(), counters(networks));
        Ok(rate_samples(rates))
    }
}

/// Totals across interfaces first, then per-interface rx/tx rates.
fn rate_samples(rates: Vec<(String, f64, f64)>) -> Vec<MetricSample> {
    let (rx_total, tx_total) = rates
        .iter()
        .fold((0.0, 0.0), |(rx, tx), (_, r, t)| (rx + r, tx + t));

    let mut samples = Vec::with_capacity(rates.len() * 2 + 2);
    samples.push(MetricSample::new(
        MetricId::new(NET_RX_TOTAL_ID),
        rx_total,
        Unit::BytesPerSec,
    ));
    samples.push(MetricSample::new(
        MetricId::new(NET_TX_TOTAL_ID),
        tx_total,
        Unit::BytesPerSec,
    ));
    for (name, rx, tx) in rates {
        samples.push(MetricSample::new(
            MetricId::instance(NET_RX_FAMILY, &name),
            rx,
            Unit::BytesPerSec,
        ));
        samples.push(MetricSample::new(
            MetricId::instance(NET_TX_FAMILY, &name),
            tx,
            Unit::BytesPerSec,
        ));
    }
    samples
}
