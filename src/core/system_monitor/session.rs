//! User-controlled view state shared between the input loop, the poll loop and
//! the renderer.
//!
//! `SessionState` values are immutable; the input handler publishes a modified
//! copy through `SessionHandle`, so readers always load a whole state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub const MIN_INTERVAL_MS: u64 = 250;
pub const MAX_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_INTERVAL_MS: u64 = 1_000;
pub const INTERVAL_STEP_MS: u64 = 250;

pub fn clamp_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Main,
    Containers,
    Alerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelId {
    System,
    Cpu,
    Memory,
    Disk,
    Network,
    Gpu,
    Battery,
}

impl PanelId {
    pub const ALL: [PanelId; 7] = [
        PanelId::System,
        PanelId::Cpu,
        PanelId::Memory,
        PanelId::Disk,
        PanelId::Network,
        PanelId::Gpu,
        PanelId::Battery,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            PanelId::System => "System",
            PanelId::Cpu => "CPU",
            PanelId::Memory => "Memory",
            PanelId::Disk => "Disk",
            PanelId::Network => "Network",
            PanelId::Gpu => "GPU",
            PanelId::Battery => "Battery",
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Process table ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
    Pid,
    Name,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Cpu => "CPU",
            SortKey::Memory => "Memory",
            SortKey::Pid => "PID",
            SortKey::Name => "Name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub view_mode: ViewMode,
    pub visible_panels: BTreeSet<PanelId>,
    pub sort_key: SortKey,
    pub poll_interval_ms: u64,
    pub show_help: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Main,
            visible_panels: PanelId::ALL.into_iter().collect(),
            sort_key: SortKey::Cpu,
            poll_interval_ms: DEFAULT_INTERVAL_MS,
            show_help: false,
        }
    }
}

impl SessionState {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(clamp_interval(self.poll_interval_ms))
    }

    pub fn is_visible(&self, panel: PanelId) -> bool {
        self.visible_panels.contains(&panel)
    }

    /// Apply one command, returning the resulting state.
    ///
    /// Every command touches exactly one field. `Quit` leaves the state as is.
    pub fn apply(&self, command: Command) -> SessionState {
        let mut next = self.clone();
        match command {
            Command::Quit => {}
            Command::ToggleHelp => next.show_help = !next.show_help,
            Command::SwitchView(mode) => next.view_mode = mode,
            Command::SortBy(key) => next.sort_key = key,
            Command::TogglePanel(panel) => {
                if !next.visible_panels.remove(&panel) {
                    next.visible_panels.insert(panel);
                }
            }
            Command::IncreaseInterval => {
                next.poll_interval_ms =
                    clamp_interval(self.poll_interval_ms.saturating_add(INTERVAL_STEP_MS));
            }
            Command::DecreaseInterval => {
                next.poll_interval_ms =
                    clamp_interval(self.poll_interval_ms.saturating_sub(INTERVAL_STEP_MS));
            }
        }
        next
    }
}

/// Discrete commands produced by the keyboard layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleHelp,
    SwitchView(ViewMode),
    SortBy(SortKey),
    TogglePanel(PanelId),
    IncreaseInterval,
    DecreaseInterval,
}

/// What applying a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The session changed and the new state was published
    Changed,
    /// The command had no effect (e.g. interval already at its bound)
    Unchanged,
    /// The caller must stop the dashboard
    Quit,
}

/// Publish-by-replacement handle to the session.
///
/// Clones share the same state. Only the input loop calls `apply`; everything
/// else calls `current`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<ArcSwap<SessionState>>,
}

impl SessionHandle {
    pub fn new(initial: SessionState) -> Self {
        let mut initial = initial;
        initial.poll_interval_ms = clamp_interval(initial.poll_interval_ms);
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn current(&self) -> Arc<SessionState> {
        self.inner.load_full()
    }

    pub fn apply(&self, command: Command) -> CommandOutcome {
        if command == Command::Quit {
            return CommandOutcome::Quit;
        }

        let previous = self.inner.rcu(|state| Arc::new(state.apply(command)));
        if previous.apply(command) == *previous {
            CommandOutcome::Unchanged
        } else {
            CommandOutcome::Changed
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}
