//! Terminal User Interface for the dashboard.
//!
//! Provides a real-time view of the published snapshots using ratatui.

mod app;
mod event_handler;
mod render;
mod widgets;

pub use app::{run_dashboard, DashboardContext};
pub use event_handler::command_for_key;
pub use render::render_ui;
