//! System monitoring core functionality.
//!
//! This module provides the dashboard engine: metric sources, the scheduler
//! that polls them, the rolling history, threshold alerting, the interactive
//! session state and the snapshot published to the render loop.

pub mod alerts;
mod gpu;
pub mod history;
mod metrics;
mod runtime;
pub mod session;
mod shutdown;
pub mod snapshot;
pub mod sources;

pub use alerts::{
    AlertEngine, AlertEvent, AlertLevel, Direction, Threshold, ThresholdSet,
    DEFAULT_ALERT_LOG_SIZE,
};
pub use gpu::{GpuMetrics, GpuProvider, GpuVendor};
pub use history::{HistoryBuffer, HistorySeries, DEFAULT_HISTORY_SIZE};
pub use metrics::{HostInfo, MetricId, MetricSample, ProcessInfo, Unit};
pub use runtime::{MetricsRuntime, Scheduler, SchedulerOptions, DEFAULT_SOURCE_TIMEOUT};
pub use session::{
    clamp_interval, Command, CommandOutcome, PanelId, SessionHandle, SessionState, SortKey,
    ViewMode,
};
pub use shutdown::{Shutdown, ShutdownListener};
pub use snapshot::{Snapshot, SnapshotCell};
pub use sources::{collect_host_info, probe_sources, MetricSource, ProcessLister};
