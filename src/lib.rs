//! Watchdog - a host supervision daemon
//!
//! Two independent loops run until SIGINT or SIGTERM:
//! - the supervisor restarts configured programs that have no live process
//! - the reaper deletes the oldest files from configured directories while a
//!   watched partition is over its usage threshold
//!
//! Configuration is re-read every cycle, so edits take effect without a restart.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod reaper;
pub mod supervisor;

pub use error::{Result, WatchdogError};
