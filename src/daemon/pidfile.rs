//! Single-instance lock
//!
//! The lock is a file holding the daemon's pid. It is created exclusively at
//! startup and removed when the guard drops, which covers normal return,
//! error return, unwinding, and signal-driven shutdown.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::{Result, WatchdogError};

/// How long an unreadable lock file is assumed to be mid-write by another instance
const WRITE_GRACE: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

/// Who holds an existing lock file
#[derive(Debug, PartialEq, Eq)]
enum Holder {
    Live(u32),
    Writing,
    Stale,
}

impl PidFile {
    /// Take the lock at `path`.
    ///
    /// Fails with `AlreadyRunning` while another live process holds it. A lock
    /// left behind by a process that no longer exists is replaced.
    pub fn acquire<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let lock_error = |e: io::Error| WatchdogError::Lock(format!("{}: {}", path.display(), e));
        let deadline = Instant::now() + WRITE_GRACE * 3;

        loop {
            match create(&path) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(lock_error(e)),
            }
            if Instant::now() > deadline {
                return Err(WatchdogError::Lock(format!("{}: contended, giving up", path.display())));
            }

            match holder(&path) {
                Holder::Live(pid) => return Err(WatchdogError::AlreadyRunning(pid)),
                Holder::Writing => sleep(POLL),
                Holder::Stale => {
                    warn!("Replacing stale lock file {}", path.display());
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(lock_error(e)),
                    }
                }
            }
        }

        info!("Acquired lock {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Released lock {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove lock {}: {}", self.path.display(), e),
        }
    }
}

/// Publish a lock file that already holds our pid.
///
/// The pid is written to a private staging file which is then hard-linked into
/// place, so the lock never exists without its content.
fn create(path: &Path) -> io::Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(".{}.tmp", std::process::id()));
    let staging = PathBuf::from(staging);

    let result = write_staging(&staging).and_then(|()| fs::hard_link(&staging, path));
    let _ = fs::remove_file(&staging);
    result
}

fn write_staging(path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    write!(file, "{}", std::process::id())?;
    file.sync_all()
}

fn holder(path: &Path) -> Holder {
    if let Some(pid) = read_pid(path) {
        if pid != std::process::id() && is_alive(pid) {
            return Holder::Live(pid);
        }
        return Holder::Stale;
    }

    let age = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok());
    match age {
        Some(age) if age < WRITE_GRACE => Holder::Writing,
        _ => Holder::Stale,
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => true,
        // Exists but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
