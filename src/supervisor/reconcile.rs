//! Reconciliation of desired programs against a live process snapshot

use super::inspector::{ProcessInfo, ProcessSnapshot};
use super::program::{ProgramSpec, normalize};

/// A desired program and the live process currently satisfying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredProcess {
    pub spec: ProgramSpec,
    /// `None` when no live process matched this cycle
    pub process: Option<ProcessInfo>,
}

impl MonitoredProcess {
    pub fn is_absent(&self) -> bool {
        self.process.is_none()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|process| process.pid)
    }
}

/// Pair every spec with at most one live process whose normalized command line equals it.
///
/// Processes are visited in pid order and the first unclaimed spec wins, so a
/// process is never claimed twice and duplicate specs need one process each.
/// Result order follows `specs`.
pub fn reconcile(specs: &[ProgramSpec], live: &ProcessSnapshot) -> Vec<MonitoredProcess> {
    let mut monitored: Vec<MonitoredProcess> = specs
        .iter()
        .map(|spec| MonitoredProcess {
            spec: spec.clone(),
            process: None,
        })
        .collect();

    let mut unclaimed = monitored.len();
    for process in live.values() {
        if unclaimed == 0 {
            break;
        }

        let cmdline = normalize(&process.cmdline);
        if let Some(slot) = monitored
            .iter_mut()
            .find(|slot| slot.is_absent() && slot.spec.as_str() == cmdline)
        {
            slot.process = Some(process.clone());
            unclaimed -= 1;
        }
    }

    monitored
}
