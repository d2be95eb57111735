//! CLI command definitions using clap.
//!
//! With no subcommand the daemon runs in the foreground until SIGINT or
//! SIGTERM. `check` validates the configuration and reports what the daemon
//! would act on, without taking the lock.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default single-instance lock file, relative to the working directory
pub const DEFAULT_PID_FILE: &str = ".watchdog.pid";

/// Watchdog - keeps configured programs running and partitions from filling up
#[derive(Parser, Debug)]
#[command(name = "watchdog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, visible_alias = "ini")]
    pub config: Option<PathBuf>,

    /// Single-instance lock file
    #[arg(long, global = true, default_value = DEFAULT_PID_FILE)]
    pub pid_file: PathBuf,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the daemon in the foreground (default)
    Run,

    /// Validate the config and show what would be supervised and reclaimed
    Check,
}
