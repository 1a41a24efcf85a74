//! Tokio runtime and poll loop for metrics collection.
//!
//! The `Scheduler` is the only writer of history, alert state and snapshots.
//! Each tick samples every source on a blocking task with a timeout, folds the
//! results into a fresh `Snapshot` and publishes it with a single swap. A call
//! that outlives its timeout stays attached to its source and is awaited again
//! on later ticks; the source gets no second call until the first returns.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::alerts::{AlertEngine, ThresholdSet};
use super::history::HistoryBuffer;
use super::metrics::{HostInfo, MetricId, MetricSample, ProcessInfo, Unit};
use super::session::SessionHandle;
use super::shutdown::{Shutdown, ShutdownListener};
use super::snapshot::{Snapshot, SnapshotCell};
use super::sources::{MetricSource, ProcessLister};
use crate::error::{DashError, Result};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(2);

/// A blocking source call that may outlive the tick that started it.
type PendingCall<T> = JoinHandle<Result<T>>;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub history_capacity: usize,
    pub alert_log_capacity: usize,
    /// Upper bound on a single source call; a slower source counts as failed for that tick
    pub source_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            history_capacity: super::history::DEFAULT_HISTORY_SIZE,
            alert_log_capacity: super::alerts::DEFAULT_ALERT_LOG_SIZE,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

pub struct Scheduler {
    sources: Vec<Arc<dyn MetricSource>>,
    processes: Option<Arc<dyn ProcessLister>>,
    history: HistoryBuffer,
    alerts: AlertEngine,
    host: Arc<HostInfo>,
    session: SessionHandle,
    cell: SnapshotCell,
    source_timeout: Duration,
    /// Metric ids each source produced on its last successful call
    reported: HashMap<MetricId, Vec<(MetricId, Unit)>>,
    failing: HashSet<MetricId>,
    /// Calls still running past their timeout, one slot per source
    in_flight: Vec<Option<PendingCall<Vec<MetricSample>>>>,
    process_in_flight: Option<PendingCall<Vec<ProcessInfo>>>,
    sequence: u64,
}

impl Scheduler {
    pub fn new(
        sources: Vec<Arc<dyn MetricSource>>,
        thresholds: ThresholdSet,
        session: SessionHandle,
        options: SchedulerOptions,
    ) -> Self {
        let host = Arc::new(HostInfo::default());
        let in_flight = sources.iter().map(|_| None).collect();
        Self {
            sources,
            processes: None,
            history: HistoryBuffer::with_capacity(options.history_capacity),
            alerts: AlertEngine::with_log_capacity(thresholds, options.alert_log_capacity),
            cell: SnapshotCell::new(Snapshot::empty(Arc::clone(&host))),
            host,
            session,
            source_timeout: options.source_timeout,
            reported: HashMap::new(),
            failing: HashSet::new(),
            in_flight,
            process_in_flight: None,
            sequence: 0,
        }
    }

    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Arc::new(host);
        self.cell
            .publish(Arc::new(Snapshot::empty(Arc::clone(&self.host))));
        self
    }

    pub fn with_process_lister(mut self, lister: Arc<dyn ProcessLister>) -> Self {
        self.processes = Some(lister);
        self
    }

    /// Read side of the published snapshots.
    pub fn snapshots(&self) -> SnapshotCell {
        self.cell.clone()
    }

    /// Sample every source once, then build and publish one snapshot.
    pub async fn tick(&mut self) -> Arc<Snapshot> {
        let timeout = self.source_timeout;

        let calls = self
            .sources
            .iter()
            .zip(self.in_flight.iter_mut())
            .map(|(source, slot)| {
                let label = source.id().to_string();
                let call = match slot.take() {
                    Some(pending) => {
                        log::debug!("source {} still busy, waiting on its previous call", label);
                        pending
                    }
                    None => {
                        let source = Arc::clone(source);
                        tokio::task::spawn_blocking(move || source.sample())
                    }
                };
                await_call(call, timeout, label)
            });

        let process_call = match (self.process_in_flight.take(), &self.processes) {
            (Some(pending), _) => Some(pending),
            (None, Some(lister)) => {
                let lister = Arc::clone(lister);
                Some(tokio::task::spawn_blocking(move || lister.list()))
            }
            (None, None) => None,
        };
        let process_call = async move {
            match process_call {
                Some(call) => Some(await_call(call, timeout, "processes".to_string()).await),
                None => None,
            }
        };
        let (results, process_result) = tokio::join!(join_all(calls), process_call);

        let mut results_in_order = Vec::with_capacity(results.len());
        for (slot, (pending, result)) in self.in_flight.iter_mut().zip(results) {
            *slot = pending;
            results_in_order.push(result);
        }
        let process_result = process_result.map(|(pending, result)| {
            self.process_in_flight = pending;
            result
        });

        let mut samples = BTreeMap::new();
        let sources = self.sources.clone();
        for (source, result) in sources.iter().zip(results_in_order) {
            let source_id = source.id();
            match result {
                Ok(batch) => {
                    if self.failing.remove(&source_id) {
                        log::info!("source {} recovered", source_id);
                    }
                    let ids: Vec<(MetricId, Unit)> =
                        batch.iter().map(|s| (s.metric_id.clone(), s.unit)).collect();
                    if let Some(previous) = self.reported.insert(source_id, ids.clone()) {
                        self.forget_vanished(previous, &ids);
                    }

                    for sample in batch.into_iter().map(sanitize) {
                        self.history.record(&sample);
                        self.alerts.evaluate(&sample);
                        samples.insert(sample.metric_id.clone(), sample);
                    }
                }
                Err(e) => {
                    if self.failing.insert(source_id.clone()) {
                        if e.is_unavailable() {
                            log::info!("source {} unavailable: {}", source_id, e);
                        } else {
                            log::warn!("source {} failed: {}", source_id, e);
                        }
                    } else {
                        log::debug!("source {} still failing: {}", source_id, e);
                    }

                    samples.insert(
                        source_id.clone(),
                        MetricSample::unavailable(source_id.clone(), source.unit()),
                    );
                    for (id, unit) in self.reported.get(&source_id).into_iter().flatten() {
                        samples.insert(id.clone(), MetricSample::unavailable(id.clone(), *unit));
                    }
                }
            }
        }

        let processes: Arc<[ProcessInfo]> = match process_result {
            Some(Ok(list)) => Arc::from(list),
            Some(Err(e)) => {
                log::debug!("process listing failed: {}", e);
                Arc::from(Vec::new())
            }
            None => Arc::from(Vec::new()),
        };

        self.sequence += 1;
        let snapshot = Arc::new(Snapshot {
            sequence: self.sequence,
            taken_at: Utc::now(),
            host: Arc::clone(&self.host),
            samples,
            histories: self.history.publish(),
            alert_levels: self
                .alerts
                .levels()
                .map(|(id, level)| (id.clone(), level))
                .collect(),
            alert_log: self.alerts.log(),
            processes,
        });

        self.cell.publish(Arc::clone(&snapshot));
        log::trace!("snapshot {} published", snapshot.sequence);
        snapshot
    }

    /// Poll until shutdown. Returns the last published snapshot.
    ///
    /// The interval is read from the session at the start of every tick and
    /// governs the wait after that tick. A shutdown arriving mid-tick lets that
    /// tick finish and publish first.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> Arc<Snapshot> {
        log::info!("scheduler started with {} sources", self.sources.len());

        loop {
            let started = Instant::now();
            let interval = self.session.current().poll_interval();

            let snapshot = self.tick().await;
            if shutdown.is_triggered() {
                return self.finish(snapshot);
            }

            let wait = interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait() => return self.finish(snapshot),
            }
        }
    }

    /// Drop history and alert state of instances a source stopped reporting
    /// (a removed container, an unplugged interface).
    fn forget_vanished(&mut self, previous: Vec<(MetricId, Unit)>, current: &[(MetricId, Unit)]) {
        for (id, _) in previous {
            if !current.iter().any(|(kept, _)| *kept == id) {
                log::debug!("metric {} no longer reported, dropping its state", id);
                self.history.remove(id.as_str());
                self.alerts.forget(id.as_str());
            }
        }
    }

    fn finish(&self, last: Arc<Snapshot>) -> Arc<Snapshot> {
        log::info!("scheduler stopped after {} ticks", self.sequence);
        last
    }
}

/// Non-finite readings are treated as missing.
fn sanitize(sample: MetricSample) -> MetricSample {
    match sample.value {
        Some(v) if !v.is_finite() => MetricSample {
            value: None,
            ..sample
        },
        _ => sample,
    }
}

/// Wait up to `timeout` for a blocking call. A call that is still running is
/// handed back so the next tick can wait on it instead of starting another.
async fn await_call<T: Send + 'static>(
    mut call: PendingCall<T>,
    timeout: Duration,
    label: String,
) -> (Option<PendingCall<T>>, Result<T>) {
    match tokio::time::timeout(timeout, &mut call).await {
        Ok(Ok(result)) => (None, result),
        Ok(Err(join_error)) => (
            None,
            Err(DashError::metric_collection(format!(
                "{} aborted: {}",
                label, join_error
            ))),
        ),
        Err(_) => (
            Some(call),
            Err(DashError::SourceTimeout {
                source_id: label,
                millis: timeout.as_millis() as u64,
            }),
        ),
    }
}

/// Wrapper around the Tokio runtime for metrics collection.
///
/// This provides a clean interface for managing the background poll loop.
pub struct MetricsRuntime {
    snapshots: SnapshotCell,
    shutdown: Shutdown,
    handle: JoinHandle<Arc<Snapshot>>,
    runtime: tokio::runtime::Runtime,
}

impl MetricsRuntime {
    /// Create the runtime and spawn the scheduler on it.
    pub fn start(scheduler: Scheduler, shutdown: Shutdown) -> anyhow::Result<Self> {
        // Create Tokio runtime with 2 worker threads
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("metrics-worker")
            .build()?;

        let snapshots = scheduler.snapshots();
        let handle = runtime.spawn(scheduler.run(shutdown.listener()));

        Ok(Self {
            snapshots,
            shutdown,
            handle,
            runtime,
        })
    }

    pub fn snapshots(&self) -> SnapshotCell {
        self.snapshots.clone()
    }

    /// Stop the poll loop, waiting for an in-flight tick to publish.
    ///
    /// Returns the final snapshot, or `None` if the poll loop died.
    pub fn shutdown(self) -> Option<Arc<Snapshot>> {
        let Self {
            shutdown,
            handle,
            runtime,
            ..
        } = self;

        shutdown.trigger();
        let last = match runtime.block_on(handle) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::error!("scheduler task ended abnormally: {}", e);
                None
            }
        };

        // Timed-out source calls may still hold blocking threads
        runtime.shutdown_timeout(Duration::from_secs(1));
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::system_monitor::alerts::{AlertLevel, Threshold};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Scripted {
        id: &'static str,
        values: Mutex<VecDeque<Option<f64>>>,
    }

    impl Scripted {
        fn new(id: &'static str, values: &[Option<f64>]) -> Self {
            Self {
                id,
                values: Mutex::new(values.iter().copied().collect()),
            }
        }
    }

    impl MetricSource for Scripted {
        fn id(&self) -> MetricId {
            MetricId::new(self.id)
        }

        fn unit(&self) -> Unit {
            Unit::Percent
        }

        fn sample(&self) -> Result<Vec<MetricSample>> {
            match self.values.lock().pop_front().flatten() {
                Some(v) => Ok(vec![MetricSample::new(self.id(), v, Unit::Percent)]),
                None => Err(DashError::metric_collection("scripted failure")),
            }
        }
    }

    struct Slow;

    impl MetricSource for Slow {
        fn id(&self) -> MetricId {
            MetricId::new("slow")
        }

        fn unit(&self) -> Unit {
            Unit::Count
        }

        fn sample(&self) -> Result<Vec<MetricSample>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![MetricSample::new(self.id(), 1.0, Unit::Count)])
        }
    }

    struct Panicking;

    impl MetricSource for Panicking {
        fn id(&self) -> MetricId {
            MetricId::new("boom")
        }

        fn unit(&self) -> Unit {
            Unit::Count
        }

        fn sample(&self) -> Result<Vec<MetricSample>> {
            panic!("source exploded")
        }
    }

    fn scheduler(sources: Vec<Arc<dyn MetricSource>>) -> Scheduler {
        Scheduler::new(
            sources,
            ThresholdSet::new([Threshold::above("cpu", 50.0, 80.0)]),
            SessionHandle::default(),
            SchedulerOptions {
                source_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_builds_history_and_alerts() {
        let cpu = Scripted::new("cpu", &[Some(10.0), Some(55.0), Some(82.0), Some(40.0)]);
        let mut scheduler = scheduler(vec![Arc::new(cpu)]);

        let mut last = None;
        for _ in 0..4 {
            last = Some(scheduler.tick().await);
        }
        let snapshot = last.unwrap();

        assert_eq!(snapshot.sequence, 4);
        assert_eq!(snapshot.history("cpu").unwrap().len(), 4);
        assert_eq!(snapshot.alert_level("cpu"), AlertLevel::Warning);
        assert_eq!(snapshot.alert_log.len(), 3);
        assert_eq!(scheduler.snapshots().latest().sequence, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_source_marks_known_ids_unavailable() {
        let cpu = Scripted::new("cpu", &[Some(90.0), None]);
        let mut scheduler = scheduler(vec![Arc::new(cpu)]);

        scheduler.tick().await;
        let snapshot = scheduler.tick().await;

        assert!(snapshot.is_unavailable("cpu"));
        // Last known level persists, history keeps only the valid sample
        assert_eq!(snapshot.alert_level("cpu"), AlertLevel::Critical);
        assert_eq!(snapshot.history("cpu").unwrap().len(), 1);
        assert_eq!(snapshot.alert_log.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_source_times_out_without_blocking_others() {
        let cpu = Scripted::new("cpu", &[Some(20.0)]);
        let mut scheduler = scheduler(vec![Arc::new(Slow), Arc::new(cpu)]);

        let started = std::time::Instant::now();
        let snapshot = scheduler.tick().await;

        assert!(started.elapsed() < Duration::from_millis(450));
        assert!(snapshot.is_unavailable("slow"));
        assert_eq!(snapshot.value("cpu"), Some(20.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_source_is_contained() {
        let cpu = Scripted::new("cpu", &[Some(20.0)]);
        let mut scheduler = scheduler(vec![Arc::new(Panicking), Arc::new(cpu)]);

        let snapshot = scheduler.tick().await;
        assert!(snapshot.is_unavailable("boom"));
        assert_eq!(snapshot.value("cpu"), Some(20.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_nan_reading_is_unavailable() {
        let cpu = Scripted::new("cpu", &[Some(f64::NAN)]);
        let mut scheduler = scheduler(vec![Arc::new(cpu)]);

        let snapshot = scheduler.tick().await;
        assert!(snapshot.is_unavailable("cpu"));
        assert!(snapshot.history("cpu").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_stops_on_shutdown_and_returns_last_snapshot() {
        let cpu = Scripted::new("cpu", &[Some(1.0); 64]);
        let scheduler = scheduler(vec![Arc::new(cpu)]);
        let cell = scheduler.snapshots();
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(scheduler.run(shutdown.listener()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let last = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
        assert!(last.sequence >= 1);
        assert_eq!(cell.latest().sequence, last.sequence);
    }

    /// Blocks until released, counting how often it was entered.
    struct Stuck {
        calls: Arc<AtomicUsize>,
        release: Arc<AtomicBool>,
    }

    impl MetricSource for Stuck {
        fn id(&self) -> MetricId {
            MetricId::new("stuck")
        }

        fn unit(&self) -> Unit {
            Unit::Count
        }

        fn sample(&self) -> Result<Vec<MetricSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(vec![MetricSample::new(self.id(), 1.0, Unit::Count)])
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hung_source_is_not_called_again_until_it_returns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));
        let stuck = Stuck {
            calls: Arc::clone(&calls),
            release: Arc::clone(&release),
        };
        let cpu = Scripted::new("cpu", &[Some(20.0); 16]);
        let mut scheduler = scheduler(vec![Arc::new(stuck), Arc::new(cpu)]);

        for _ in 0..10 {
            let snapshot = scheduler.tick().await;
            assert!(snapshot.is_unavailable("stuck"));
            assert_eq!(snapshot.value("cpu"), Some(20.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The pending call finishes and its result lands in the next tick
        release.store(true, Ordering::SeqCst);
        let snapshot = scheduler.tick().await;
        assert_eq!(snapshot.value("stuck"), Some(1.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        scheduler.tick().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Reports one `container_cpu:<name>` per running container.
    struct Fleet {
        rounds: Mutex<VecDeque<Vec<&'static str>>>,
    }

    impl MetricSource for Fleet {
        fn id(&self) -> MetricId {
            MetricId::new("containers")
        }

        fn unit(&self) -> Unit {
            Unit::Count
        }

        fn sample(&self) -> Result<Vec<MetricSample>> {
            let names = self.rounds.lock().pop_front().unwrap_or_default();
            let mut samples = vec![MetricSample::new(self.id(), names.len() as f64, Unit::Count)];
            samples.extend(names.iter().map(|name| {
                MetricSample::new(MetricId::instance("container_cpu", name), 90.0, Unit::Percent)
            }));
            Ok(samples)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_removed_container_state_is_dropped() {
        let fleet = Fleet {
            rounds: Mutex::new(VecDeque::from(vec![vec!["web", "db"], vec!["web"]])),
        };
        let mut scheduler = Scheduler::new(
            vec![Arc::new(fleet)],
            ThresholdSet::new([Threshold::above("container_cpu", 50.0, 80.0)]),
            SessionHandle::default(),
            SchedulerOptions::default(),
        );

        let first = scheduler.tick().await;
        assert!(first.history("container_cpu:db").is_some());
        assert_eq!(first.alert_level("container_cpu:db"), AlertLevel::Critical);

        let second = scheduler.tick().await;
        assert!(second.sample("container_cpu:db").is_none());
        assert!(second.history("container_cpu:db").is_none());
        assert!(!second.alert_levels.contains_key("container_cpu:db"));
        assert_eq!(second.alert_level("container_cpu:web"), AlertLevel::Critical);
        assert_eq!(second.value("containers"), Some(1.0));
        // Past transitions stay in the log
        assert_eq!(second.alert_log.len(), 2);

        // The last container leaving clears its state as well
        let third = scheduler.tick().await;
        assert_eq!(third.value("containers"), Some(0.0));
        assert!(third.history("container_cpu:web").is_none());
    }
}
