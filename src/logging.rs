//! Log sink setup
//!
//! env_logger writes `<time> : <LEVEL> : <target> : <message>` lines to
//! `<log dir>/watchdog.log`, optionally mirrored to stderr. The log is rotated
//! at startup and again at the top of every hour while the daemon runs.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use log::info;

use crate::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "watchdog.log";

type Clock = Box<dyn Fn() -> DateTime<Local> + Send>;

fn hour_of(now: &DateTime<Local>) -> i64 {
    now.timestamp().div_euclid(3600)
}

fn open_log(dir: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(dir.join(LOG_FILE_NAME))
}

/// Hourly-rotated log file, with every line also sent to stderr when `console` is set.
struct Tee {
    dir: PathBuf,
    backup: usize,
    file: File,
    hour: i64,
    clock: Clock,
    console: bool,
}

impl Tee {
    fn open(dir: &Path, backup: usize, console: bool, clock: Clock) -> io::Result<Self> {
        let file = open_log(dir)?;
        let hour = hour_of(&clock());
        Ok(Self {
            dir: dir.to_path_buf(),
            backup,
            file,
            hour,
            clock,
            console,
        })
    }

    fn roll_over_if_due(&mut self) {
        let hour = hour_of(&(self.clock)());
        if hour == self.hour {
            return;
        }
        self.hour = hour;

        let _ = self.file.flush();
        // Logging from inside the logger would recurse; report on stderr instead
        match rotate_logs(&self.dir, self.backup).and_then(|()| open_log(&self.dir)) {
            Ok(file) => self.file = file,
            Err(e) => {
                let _ = writeln!(io::stderr(), "watchdog: log rotation in {} failed: {}", self.dir.display(), e);
            }
        }
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_over_if_due();
        if self.console {
            // A closed stderr must not stop file logging
            let _ = io::stderr().write_all(buf);
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            let _ = io::stderr().flush();
        }
        self.file.flush()
    }
}

/// Path of the n-th rotated copy (`watchdog.log.1` is the newest).
fn backup_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_NAME, n))
}

/// Shift `watchdog.log` to `watchdog.log.1`, `.1` to `.2` and so on, keeping at most `backup` copies.
pub fn rotate_logs(dir: &Path, backup: usize) -> io::Result<()> {
    let current = dir.join(LOG_FILE_NAME);
    if !current.exists() {
        return Ok(());
    }

    if backup == 0 {
        return fs::remove_file(&current);
    }

    let oldest = backup_path(dir, backup);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backup).rev() {
        let from = backup_path(dir, n);
        if from.exists() {
            fs::rename(&from, backup_path(dir, n + 1))?;
        }
    }
    fs::rename(&current, backup_path(dir, 1))
}

/// Install the global logger. `RUST_LOG` overrides the configured level.
pub fn setup_logging(config: &LoggingConfig) -> Result<PathBuf> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
    rotate_logs(&log_dir, config.backup).context("Failed to rotate log files")?;

    let log_file = log_dir.join(LOG_FILE_NAME);
    let target = Box::new(
        Tee::open(&log_dir, config.backup, config.console_log, Box::new(Local::now))
            .context("Failed to open log file")?,
    );

    env_logger::Builder::new()
        .filter_level(config.level_filter())
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} : {} : {} : {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(target))
        .try_init()
        .context("Logger already initialized")?;

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// Flush buffered log output before exit.
pub fn flush() {
    log::logger().flush();
}
