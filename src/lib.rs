// sysdash library - public API

// Re-export error types
pub mod error;
pub use error::{DashError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod ui;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

// Re-export commonly used types
pub use core::config::DashboardConfig;

/// Default log file used while the TUI owns the terminal
pub fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("sysdash").join("sysdash.log"))
}

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
///
/// With a `log_file`, records are appended there instead of stderr.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // A logger may already be installed (tests, embedding)
    if builder.try_init().is_err() {
        log::debug!("logger already initialized");
    }
    Ok(())
}
