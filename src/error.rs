//! Error types for Watchdog
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Watchdog
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// Missing or malformed configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Single-instance lock could not be taken or released
    #[error("Lock error: {0}")]
    Lock(String),

    /// Another live instance holds the lock
    #[error("Already running with pid {0}")]
    AlreadyRunning(u32),

    /// Program could not be launched
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Partition usage could not be measured
    #[error("Disk error: {0}")]
    Disk(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Watchdog operations
pub type Result<T> = std::result::Result<T, WatchdogError>;
