//! Randomised interleavings of input commands, snapshot publication and reads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sysdash::core::system_monitor::{
    clamp_interval, Command, HostInfo, MetricId, MetricSample, MetricSource, MetricsRuntime,
    PanelId, Scheduler, SchedulerOptions, SessionHandle, SessionState, Shutdown, Snapshot,
    SnapshotCell, SortKey, Threshold, ThresholdSet, Unit, ViewMode,
};
use sysdash::error::Result;

fn random_command(rng: &mut StdRng) -> Command {
    match rng.gen_range(0..6) {
        0 => Command::IncreaseInterval,
        1 => Command::DecreaseInterval,
        2 => Command::SortBy(
            [SortKey::Cpu, SortKey::Memory, SortKey::Pid, SortKey::Name][rng.gen_range(0..4)],
        ),
        3 => Command::SwitchView(
            [ViewMode::Main, ViewMode::Containers, ViewMode::Alerts][rng.gen_range(0..3)],
        ),
        4 => Command::ToggleHelp,
        _ => Command::TogglePanel(PanelId::ALL[rng.gen_range(0..PanelId::ALL.len())]),
    }
}

fn assert_session_consistent(state: &SessionState) {
    assert_eq!(clamp_interval(state.poll_interval_ms), state.poll_interval_ms);
    assert_eq!(state.poll_interval_ms % 250, 0);
}

/// Every sample in a published snapshot carries that snapshot's sequence number.
fn numbered_snapshot(sequence: u64) -> Snapshot {
    let mut snapshot = Snapshot::empty(Arc::new(HostInfo::default()));
    snapshot.sequence = sequence;
    for id in ["a", "b", "c", "d"] {
        snapshot.samples.insert(
            MetricId::new(id),
            MetricSample::new(MetricId::new(id), sequence as f64, Unit::Count),
        );
    }
    snapshot
}

fn assert_snapshot_whole(snapshot: &Snapshot) {
    if snapshot.sequence == 0 {
        assert!(snapshot.samples.is_empty());
        return;
    }
    assert_eq!(snapshot.samples.len(), 4);
    for sample in snapshot.samples.values() {
        assert_eq!(sample.value, Some(snapshot.sequence as f64));
    }
}

#[test]
fn test_readers_never_see_torn_snapshots() {
    let cell = SnapshotCell::new(Snapshot::empty(Arc::new(HostInfo::default())));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cell = cell.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = 0;
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    let snapshot = cell.latest();
                    assert_snapshot_whole(&snapshot);
                    assert!(snapshot.sequence >= last_seen);
                    last_seen = snapshot.sequence;
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(7);
    for sequence in 1..=2_000 {
        cell.publish(Arc::new(numbered_snapshot(sequence)));
        if rng.gen_bool(0.1) {
            thread::yield_now();
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(cell.latest().sequence, 2_000);
}

#[test]
fn test_concurrent_commands_are_not_lost() {
    let session = SessionHandle::default();

    let writers: Vec<_> = (0..4u64)
        .map(|seed| {
            let session = session.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut toggles: BTreeMap<PanelId, usize> = BTreeMap::new();
                for _ in 0..500 {
                    let command = random_command(&mut rng);
                    if let Command::TogglePanel(panel) = command {
                        *toggles.entry(panel).or_default() += 1;
                    }
                    session.apply(command);
                    assert_session_consistent(&session.current());
                }
                toggles
            })
        })
        .collect();

    let mut total: BTreeMap<PanelId, usize> = BTreeMap::new();
    for writer in writers {
        for (panel, count) in writer.join().unwrap() {
            *total.entry(panel).or_default() += count;
        }
    }

    // All panels start visible, so an even number of toggles leaves one visible
    let state = session.current();
    for panel in PanelId::ALL {
        let toggled = total.get(&panel).copied().unwrap_or(0);
        assert_eq!(state.is_visible(panel), toggled % 2 == 0, "panel {}", panel);
    }
}

struct Jittery {
    id: &'static str,
}

impl MetricSource for Jittery {
    fn id(&self) -> MetricId {
        MetricId::new(self.id)
    }

    fn unit(&self) -> Unit {
        Unit::Percent
    }

    fn sample(&self) -> Result<Vec<MetricSample>> {
        let mut rng = rand::thread_rng();
        thread::sleep(Duration::from_millis(rng.gen_range(0..5)));
        Ok(vec![MetricSample::new(
            self.id(),
            rng.gen_range(0.0..100.0),
            Unit::Percent,
        )])
    }
}

#[test]
fn test_engine_under_random_input() {
    let session = SessionHandle::new(SessionState {
        poll_interval_ms: 250,
        ..SessionState::default()
    });
    let scheduler = Scheduler::new(
        vec![
            Arc::new(Jittery { id: "cpu" }),
            Arc::new(Jittery { id: "memory" }),
        ],
        ThresholdSet::new([
            Threshold::above("cpu", 40.0, 70.0),
            Threshold::above("memory", 40.0, 70.0),
        ]),
        session.clone(),
        SchedulerOptions {
            history_capacity: 5,
            alert_log_capacity: 8,
            source_timeout: Duration::from_millis(200),
        },
    );
    let runtime = MetricsRuntime::start(scheduler, Shutdown::new()).unwrap();
    let snapshots = runtime.snapshots();

    let input = {
        let session = session.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(42);
            let deadline = Instant::now() + Duration::from_millis(1500);
            while Instant::now() < deadline {
                session.apply(random_command(&mut rng));
                thread::sleep(Duration::from_millis(rng.gen_range(0..3)));
            }
        })
    };

    let mut last_seen = 0;
    let deadline = Instant::now() + Duration::from_millis(1500);
    while Instant::now() < deadline {
        let snapshot = snapshots.latest();
        assert!(snapshot.sequence >= last_seen);
        last_seen = snapshot.sequence;

        assert!(snapshot.alert_log.len() <= 8);
        for series in snapshot.histories.values() {
            assert!(series.len() <= 5);
        }
        // Levels in a snapshot belong to that same tick's alert log
        for (id, level) in &snapshot.alert_levels {
            if let Some(event) = snapshot.alert_log.iter().rev().find(|e| &e.metric_id == id) {
                assert_eq!(event.to_level, *level);
            }
        }
        assert_session_consistent(&session.current());
        thread::sleep(Duration::from_millis(1));
    }

    input.join().unwrap();
    let last = runtime.shutdown().unwrap();
    assert!(last.sequence >= 1);
}
