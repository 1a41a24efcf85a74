//! Dashboard command handler.
//!
//! Wires config, sources and the scheduler together, then hands the published
//! snapshots to either the TUI or the JSON printer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::DashboardConfig;
use crate::core::system_monitor::{
    clamp_interval, collect_host_info, probe_sources, sources::SysinfoProcessLister,
    MetricsRuntime, Scheduler, SessionHandle, Shutdown, SnapshotCell,
};
use crate::ui::monitor_tui::{run_dashboard, DashboardContext};

const JSON_POLL: Duration = Duration::from_millis(50);

/// Execute the dashboard command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let json_output = matches.get_flag("json");

    // The TUI owns stdout/stderr, so it always logs to a file
    let log_file = matches
        .get_one::<PathBuf>("log-file")
        .cloned()
        .or_else(|| if json_output { None } else { crate::default_log_path() });
    crate::init_logging(log_file.as_deref()).context("Failed to initialize logging")?;

    let config_path = match matches.get_one::<PathBuf>("config") {
        Some(path) => Some(path.clone()),
        None => DashboardConfig::config_path()
            .map_err(|e| log::warn!("running with default config: {}", e))
            .ok(),
    };
    let file_config = match &config_path {
        Some(path) => DashboardConfig::load_from(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => DashboardConfig::default(),
    };
    let config = apply_overrides(file_config.clone(), matches);

    let session = SessionHandle::new(config.session());
    let shutdown = Shutdown::new();

    let scheduler = Scheduler::new(
        probe_sources(&config),
        config.threshold_set(),
        session.clone(),
        config.scheduler_options(),
    )
    .with_host(collect_host_info())
    .with_process_lister(Arc::new(SysinfoProcessLister::new()));

    // Wait for CPU measurement interval
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    let runtime = MetricsRuntime::start(scheduler, shutdown.clone())
        .context("Failed to start metrics runtime")?;

    let result = if json_output {
        run_json_output(runtime.snapshots(), shutdown)
    } else {
        let persist = !matches.get_flag("no-save");
        run_dashboard(DashboardContext {
            snapshots: runtime.snapshots(),
            session,
            shutdown,
            config: file_config,
            config_path: config_path.filter(|_| persist),
        })
        .context("Failed to run dashboard")
    };

    if let Some(last) = runtime.shutdown() {
        log::info!("stopped at snapshot {}", last.sequence);
    }
    result
}

/// CLI values win over the config file for this session.
fn apply_overrides(mut config: DashboardConfig, matches: &ArgMatches) -> DashboardConfig {
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.update_interval_ms = clamp_interval(*interval);
    }
    if let Some(history) = matches.get_one::<usize>("history") {
        config.history_capacity = (*history).max(1);
    }
    config
}

/// Run in JSON output mode (for scripting)
fn run_json_output(snapshots: SnapshotCell, shutdown: Shutdown) -> Result<()> {
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.trigger())
            .context("Failed to install Ctrl+C handler")?;
    }

    let mut last_printed = 0;
    while !shutdown.is_triggered() {
        let snapshot = snapshots.latest();
        if snapshot.sequence != last_printed {
            println!("{}", serde_json::to_string(&*snapshot)?);
            last_printed = snapshot.sequence;
        }
        std::thread::sleep(JSON_POLL);
    }
    Ok(())
}
