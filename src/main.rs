use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

use sysdash::commands;

fn build_cli() -> Command {
    Command::new("sysdash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live terminal dashboard for host and container metrics")
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MS")
                .help("Poll interval in milliseconds (250-10000)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Config file to load (defaults to the user config directory)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("no-save")
                .long("no-save")
                .help("Do not write session changes back to the config file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON snapshot per tick instead of the dashboard")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .help("Write logs to this file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .value_name("N")
                .help("Samples kept per metric for trend display")
                .value_parser(clap::value_parser!(usize)),
        )
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    commands::monitor::execute(&matches)
}
