use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysdash::core::system_monitor::{
    AlertLevel, Command, MetricId, MetricSample, MetricSource, MetricsRuntime, Scheduler,
    SchedulerOptions, SessionHandle, SessionState, Shutdown, Threshold, ThresholdSet, Unit,
};
use sysdash::error::{DashError, Result};

/// Replays a fixed list of readings, then repeats the last one.
struct Replay {
    id: &'static str,
    values: Mutex<VecDeque<f64>>,
}

impl Replay {
    fn new(id: &'static str, values: &[f64]) -> Self {
        Self {
            id,
            values: Mutex::new(values.iter().copied().collect()),
        }
    }
}

impl MetricSource for Replay {
    fn id(&self) -> MetricId {
        MetricId::new(self.id)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut values = self.values.lock();
        let value = if values.len() > 1 {
            values.pop_front()
        } else {
            values.front().copied()
        };
        match value {
            Some(v) => Ok(vec![MetricSample::new(self.id(), v, Unit::Percent)]),
            None => Err(DashError::metric_collection("nothing to replay")),
        }
    }
}

struct DockerDown;

impl MetricSource for DockerDown {
    fn id(&self) -> MetricId {
        MetricId::new("containers")
    }

    fn unit(&self) -> Unit {
        Unit::Count
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        Err(DashError::source_unavailable("Cannot connect to the Docker daemon"))
    }
}

fn cpu_thresholds() -> ThresholdSet {
    ThresholdSet::new([Threshold::above("cpu", 50.0, 80.0)])
}

fn options() -> SchedulerOptions {
    SchedulerOptions {
        source_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cpu_alert_sequence() {
    let cpu = Replay::new("cpu", &[10.0, 55.0, 82.0, 40.0]);
    let mut scheduler = Scheduler::new(
        vec![Arc::new(cpu)],
        cpu_thresholds(),
        SessionHandle::default(),
        options(),
    );

    let mut levels = Vec::new();
    for _ in 0..4 {
        let snapshot = scheduler.tick().await;
        levels.push(snapshot.alert_level("cpu"));
    }
    assert_eq!(
        levels,
        vec![
            AlertLevel::Ok,
            AlertLevel::Warning,
            AlertLevel::Critical,
            AlertLevel::Warning
        ]
    );

    let snapshot = scheduler.snapshots().latest();
    let transitions: Vec<(AlertLevel, AlertLevel)> = snapshot
        .alert_log
        .iter()
        .map(|e| (e.from_level, e.to_level))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (AlertLevel::Ok, AlertLevel::Warning),
            (AlertLevel::Warning, AlertLevel::Critical),
            (AlertLevel::Critical, AlertLevel::Warning),
        ]
    );

    let history: Vec<f64> = snapshot.history("cpu").unwrap().iter().collect();
    assert_eq!(history, vec![10.0, 55.0, 82.0, 40.0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_steady_reading_logs_nothing_new() {
    let cpu = Replay::new("cpu", &[85.0]);
    let mut scheduler = Scheduler::new(
        vec![Arc::new(cpu)],
        cpu_thresholds(),
        SessionHandle::default(),
        options(),
    );

    for _ in 0..5 {
        scheduler.tick().await;
    }
    let snapshot = scheduler.snapshots().latest();
    assert_eq!(snapshot.alert_level("cpu"), AlertLevel::Critical);
    assert_eq!(snapshot.alert_log.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_container_source_is_isolated() {
    let cpu = Replay::new("cpu", &[20.0, 60.0, 90.0]);
    let mut scheduler = Scheduler::new(
        vec![Arc::new(DockerDown), Arc::new(cpu)],
        cpu_thresholds(),
        SessionHandle::default(),
        options(),
    );

    for _ in 0..3 {
        let snapshot = scheduler.tick().await;
        assert!(snapshot.is_unavailable("containers"));
        assert!(snapshot.history("containers").is_none());
    }

    let snapshot = scheduler.snapshots().latest();
    assert_eq!(snapshot.alert_level("cpu"), AlertLevel::Critical);
    assert_eq!(snapshot.alert_log.len(), 2);
    assert!(snapshot
        .alert_log
        .iter()
        .all(|event| event.metric_id.as_str() == "cpu"));
}

/// Records when it was called and lowers the poll interval on its first call.
struct IntervalProbe {
    session: SessionHandle,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl MetricSource for IntervalProbe {
    fn id(&self) -> MetricId {
        MetricId::new("probe")
    }

    fn unit(&self) -> Unit {
        Unit::Count
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut calls = self.calls.lock();
        calls.push(Instant::now());
        if calls.len() == 1 {
            for _ in 0..10 {
                self.session.apply(Command::DecreaseInterval);
            }
        }
        Ok(vec![MetricSample::new(self.id(), calls.len() as f64, Unit::Count)])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_change_applies_from_next_tick() {
    let session = SessionHandle::new(SessionState {
        poll_interval_ms: 1500,
        ..SessionState::default()
    });
    let calls = Arc::new(Mutex::new(Vec::new()));
    let probe = IntervalProbe {
        session: session.clone(),
        calls: Arc::clone(&calls),
    };

    let scheduler = Scheduler::new(vec![Arc::new(probe)], ThresholdSet::default(), session.clone(), options());
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.listener()));

    tokio::time::sleep(Duration::from_millis(2200)).await;
    shutdown.trigger();
    handle.await.unwrap();

    assert_eq!(session.current().poll_interval_ms, 250);
    let calls = calls.lock();
    assert!(calls.len() >= 3, "only {} ticks ran", calls.len());
    // The tick that saw the change still waits the old interval
    assert!(calls[1] - calls[0] >= Duration::from_millis(1400));
    assert!(calls[2] - calls[1] < Duration::from_millis(1000));
}

/// Spends most of each poll interval working and records when each call began.
struct Busy {
    work: Duration,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl MetricSource for Busy {
    fn id(&self) -> MetricId {
        MetricId::new("busy")
    }

    fn unit(&self) -> Unit {
        Unit::Count
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        self.calls.lock().push(Instant::now());
        std::thread::sleep(self.work);
        Ok(vec![MetricSample::new(self.id(), 1.0, Unit::Count)])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_tick_keeps_interval_cadence() {
    let session = SessionHandle::new(SessionState {
        poll_interval_ms: 250,
        ..SessionState::default()
    });
    let calls = Arc::new(Mutex::new(Vec::new()));
    let busy = Busy {
        work: Duration::from_millis(150),
        calls: Arc::clone(&calls),
    };

    let scheduler = Scheduler::new(vec![Arc::new(busy)], ThresholdSet::default(), session, options());
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.listener()));

    tokio::time::sleep(Duration::from_millis(1400)).await;
    shutdown.trigger();
    handle.await.unwrap();

    let calls = calls.lock();
    assert!(calls.len() >= 4, "only {} ticks ran", calls.len());
    // Work time is absorbed by the wait; interval + work would be 400ms
    for pair in calls.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(200), "gap {:?}", gap);
        assert!(gap < Duration::from_millis(340), "gap {:?}", gap);
    }
}

/// Takes a while to answer so shutdown can land mid-tick.
struct Sluggish;

impl MetricSource for Sluggish {
    fn id(&self) -> MetricId {
        MetricId::new("sluggish")
    }

    fn unit(&self) -> Unit {
        Unit::Count
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(vec![MetricSample::new(self.id(), 7.0, Unit::Count)])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_mid_tick_publishes_that_tick() {
    let scheduler = Scheduler::new(
        vec![Arc::new(Sluggish)],
        ThresholdSet::default(),
        SessionHandle::default(),
        options(),
    );
    let cell = scheduler.snapshots();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.listener()));

    // First tick is still waiting on the source
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let last = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poll loop should stop within the source timeout")
        .unwrap();
    assert_eq!(last.sequence, 1);
    assert_eq!(last.value("sluggish"), Some(7.0));
    assert_eq!(cell.latest().sequence, 1);
}

#[test]
fn test_metrics_runtime_start_and_shutdown() {
    let cpu = Replay::new("cpu", &[33.0]);
    let scheduler = Scheduler::new(
        vec![Arc::new(cpu)],
        cpu_thresholds(),
        SessionHandle::new(SessionState {
            poll_interval_ms: 250,
            ..SessionState::default()
        }),
        options(),
    );

    let runtime = MetricsRuntime::start(scheduler, Shutdown::new()).unwrap();
    let snapshots = runtime.snapshots();

    let deadline = Instant::now() + Duration::from_secs(2);
    while snapshots.latest().sequence < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }

    let last = runtime.shutdown().expect("poll loop should return its last snapshot");
    assert!(last.sequence >= 2);
    assert_eq!(last.value("cpu"), Some(33.0));
    assert_eq!(snapshots.latest().sequence, last.sequence);
}
