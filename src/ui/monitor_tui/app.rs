use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::config::DashboardConfig;
use crate::core::system_monitor::{
    CommandOutcome, SessionHandle, Shutdown, SnapshotCell,
};

use super::event_handler::command_for_key;
use super::render::render_ui;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Handles shared between the dashboard front-end and the engine
pub struct DashboardContext {
    pub snapshots: SnapshotCell,
    pub session: SessionHandle,
    pub shutdown: Shutdown,
    pub config: DashboardConfig,
    /// Where session changes are written back; `None` disables saving
    pub config_path: Option<PathBuf>,
}

/// Run the dashboard TUI until the user quits or shutdown is triggered elsewhere
pub fn run_dashboard(ctx: DashboardContext) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(terminal) => terminal,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    let input = {
        let session = ctx.session.clone();
        let shutdown = ctx.shutdown.clone();
        let config = ctx.config.clone();
        let config_path = ctx.config_path.clone();
        let spawned = thread::Builder::new()
            .name("input".to_string())
            .spawn(move || input_loop(session, shutdown, config, config_path));
        match spawned {
            Ok(handle) => handle,
            Err(e) => {
                restore_terminal();
                return Err(e).context("Failed to spawn input thread");
            }
        }
    };

    let result = render_loop(&mut terminal, &ctx);

    // Make sure the input thread sees the exit even when rendering failed
    ctx.shutdown.trigger();
    let input_result = match input.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("input thread panicked")),
    };

    restore_terminal();
    terminal.show_cursor().context("Failed to show cursor")?;

    result.and(input_result)
}

fn render_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    ctx: &DashboardContext,
) -> Result<()> {
    while !ctx.shutdown.is_triggered() {
        let snapshot = ctx.snapshots.latest();
        let session = ctx.session.current();
        terminal
            .draw(|frame| render_ui(frame, &snapshot, &session, ctx.config.top_processes))
            .map_err(|e| anyhow::anyhow!("Failed to draw frame: {}", e))?;
        thread::sleep(FRAME_INTERVAL);
    }
    Ok(())
}

fn input_loop(
    session: SessionHandle,
    shutdown: Shutdown,
    config: DashboardConfig,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut saved = config;

    while !shutdown.is_triggered() {
        if !event::poll(INPUT_POLL).context("Event poll failed")? {
            continue;
        }
        let Event::Key(key) = event::read().context("Event read failed")? else {
            continue;
        };
        let Some(command) = command_for_key(key) else {
            continue;
        };

        match session.apply(command) {
            CommandOutcome::Quit => shutdown.trigger(),
            CommandOutcome::Unchanged => {}
            CommandOutcome::Changed => {
                log::debug!("session command applied: {:?}", command);
                if let Some(path) = &config_path {
                    let next = saved.with_session(&session.current());
                    if next != saved {
                        if let Err(e) = next.save_to(path) {
                            log::warn!("failed to save config: {}", e);
                        }
                        saved = next;
                    }
                }
            }
        }
    }
    Ok(())
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        log::warn!("Failed to disable raw mode: {}", e);
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen) {
        log::warn!("Failed to leave alternate screen: {}", e);
    }
}
