//! Process Supervisor - keeps the configured programs running
//!
//! Each cycle:
//! - Reaps children this supervisor started that have exited
//! - Re-reads the program list and matches it against a fresh process snapshot
//! - Starts every program that has no live process

pub mod inspector;
pub mod program;
pub mod reconcile;
pub mod spawner;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::{ProgramEntry, SettingsSource};

pub use inspector::{MockInspector, ProcessInfo, ProcessInspector, ProcessSnapshot, SysinfoInspector};
pub use program::{ProgramSpec, normalize};
pub use reconcile::{MonitoredProcess, reconcile};
pub use spawner::{StartedProcess, spawn};

/// What one supervisor cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Programs that already had a live process
    pub running: usize,
    /// Programs launched this cycle
    pub started: usize,
    /// Launches that failed; retried next cycle
    pub failed: usize,
    /// Own children observed to have exited
    pub reaped: usize,
}

pub struct Supervisor<I: ProcessInspector> {
    settings: Arc<dyn SettingsSource>,
    inspector: I,
    started: BTreeMap<u32, StartedProcess>,
    monitored: Vec<MonitoredProcess>,
    interval: Duration,
    rejected: HashSet<String>,
}

impl<I: ProcessInspector> Supervisor<I> {
    pub fn new(settings: Arc<dyn SettingsSource>, inspector: I) -> Self {
        let interval = settings.watchdog().poll_interval();
        Self {
            settings,
            inspector,
            started: BTreeMap::new(),
            monitored: Vec::new(),
            interval,
            rejected: HashSet::new(),
        }
    }

    /// Poll interval from the most recent configuration read
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Result of the last reconciliation
    pub fn monitored(&self) -> &[MonitoredProcess] {
        &self.monitored
    }

    /// Pids of children started here and not yet seen exiting
    pub fn started_pids(&self) -> Vec<u32> {
        self.started.keys().copied().collect()
    }

    /// Match the configured programs against the live process table.
    pub fn reconcile(&mut self) -> &[MonitoredProcess] {
        let config = self.settings.watchdog();
        self.interval = config.poll_interval();

        let specs = self.program_specs(&config.programs);
        let mut live = self.inspector.snapshot(&config.process_prefix);

        // A child we have not seen exit is its program, whatever the table says its argv is
        // (interpreters rewrite it for shebang scripts) or whether the name filter hid it.
        for (pid, child) in &self.started {
            live.insert(*pid, ProcessInfo::new(*pid, child.spec().tokens()));
        }

        self.monitored = reconcile(&specs, &live);
        for slot in &self.monitored {
            match slot.pid() {
                Some(pid) => debug!("Process {} is running with pid {}", slot.spec, pid),
                None => debug!("Process {} is not running", slot.spec),
            }
        }
        &self.monitored
    }

    /// Launch a configured program. Returns its pid, or `None` if it was rejected or failed to spawn.
    pub fn start(&mut self, entry: &ProgramEntry) -> Option<u32> {
        match ProgramSpec::from_entry(entry) {
            Ok(spec) => self.launch(&spec),
            Err(e) => {
                warn!("Not starting {:?}: {}", entry, e);
                None
            }
        }
    }

    /// Drop handles of children that have exited. Returns how many were reaped.
    pub fn sweep(&mut self) -> usize {
        let before = self.started.len();
        self.started.retain(|pid, child| match child.try_exit() {
            Ok(Some(status)) => {
                info!(
                    "{} (pid {}) exited after {:?}: {}",
                    child.spec(),
                    pid,
                    child.uptime(),
                    status
                );
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Lost track of {} (pid {}): {}", child.spec(), pid, e);
                false
            }
        });
        before - self.started.len()
    }

    /// Sweep, reconcile, then start everything absent.
    pub fn cycle(&mut self) -> CycleReport {
        let reaped = self.sweep();
        self.reconcile();

        let absent: Vec<ProgramSpec> = self
            .monitored
            .iter()
            .filter(|slot| slot.is_absent())
            .map(|slot| slot.spec.clone())
            .collect();

        let mut report = CycleReport {
            running: self.monitored.len() - absent.len(),
            reaped,
            ..Default::default()
        };

        for spec in &absent {
            match self.launch(spec) {
                Some(_) => report.started += 1,
                None => report.failed += 1,
            }
        }

        report
    }

    fn launch(&mut self, spec: &ProgramSpec) -> Option<u32> {
        info!("Starting {}", spec);
        match spawn(spec) {
            Ok(child) => {
                let pid = child.pid();
                debug!("Process started successfully, pid: {}", pid);
                self.started.insert(pid, child);
                Some(pid)
            }
            Err(e) => {
                error!("Failed to start {}, retrying next cycle: {}", spec, e);
                None
            }
        }
    }

    /// Valid specs from the configured entries; malformed entries are reported once and skipped.
    fn program_specs(&mut self, entries: &[ProgramEntry]) -> Vec<ProgramSpec> {
        entries
            .iter()
            .filter_map(|entry| match ProgramSpec::from_entry(entry) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    if self.rejected.insert(format!("{:?}", entry)) {
                        warn!("Skipping program entry {:?}: {}", entry, e);
                    }
                    None
                }
            })
            .collect()
    }
}
