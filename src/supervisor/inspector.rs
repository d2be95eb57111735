//! Process Inspector - read-only snapshots of the OS process table

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use sysinfo::{ProcessRefreshKind, ProcessStatus, System, UpdateKind};

/// One running process as seen by the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Executable name
    pub name: String,
    /// Owning user id, when the OS reports one
    pub owner: Option<u32>,
    /// Full command line, program first
    pub cmdline: Vec<String>,
    /// Creation time in seconds since the Unix epoch
    pub started_at: u64,
}

impl ProcessInfo {
    pub fn new<S: Into<String>>(pid: u32, cmdline: Vec<S>) -> Self {
        let cmdline: Vec<String> = cmdline.into_iter().map(Into::into).collect();
        let name = cmdline
            .first()
            .and_then(|program| program.rsplit('/').next())
            .unwrap_or_default()
            .to_string();
        Self {
            pid,
            name,
            owner: None,
            cmdline,
            started_at: 0,
        }
    }
}

/// Snapshot keyed by pid.
pub type ProcessSnapshot = BTreeMap<u32, ProcessInfo>;

/// Source of live process snapshots.
pub trait ProcessInspector: Send {
    /// Every running process whose executable name starts with `prefix`.
    ///
    /// Best effort: a process that exits while the table is read is simply absent.
    fn snapshot(&mut self, prefix: &str) -> ProcessSnapshot;
}

/// Inspector backed by the sysinfo process table.
pub struct SysinfoInspector {
    system: System,
}

impl SysinfoInspector {
    pub fn new() -> Self {
        Self { system: System::new() }
    }
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for SysinfoInspector {
    fn snapshot(&mut self, prefix: &str) -> ProcessSnapshot {
        // argv can change on exec, so it is re-read every time; the owner cannot
        let refresh = ProcessRefreshKind::new()
            .with_cmd(UpdateKind::Always)
            .with_user(UpdateKind::OnlyIfNotSet);
        self.system.refresh_processes_specifics(refresh);

        self.system
            .processes()
            .values()
            .filter(|process| process.name().starts_with(prefix))
            // Threads share their leader's command line; zombies and kernel threads have none
            .filter(|process| process.thread_kind().is_none())
            .filter(|process| process.status() != ProcessStatus::Zombie && !process.cmd().is_empty())
            .map(|process| {
                let pid = process.pid().as_u32();
                let info = ProcessInfo {
                    pid,
                    name: process.name().to_string(),
                    owner: process.user_id().map(|uid| **uid),
                    cmdline: process.cmd().to_vec(),
                    started_at: process.start_time(),
                };
                (pid, info)
            })
            .collect()
    }
}

/// Inspector returning a snapshot set by the caller.
///
/// Clones share the same table, so a test can keep one handle and give
/// the other to a supervisor.
#[derive(Debug, Clone, Default)]
pub struct MockInspector {
    processes: Arc<Mutex<Vec<ProcessInfo>>>,
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, processes: Vec<ProcessInfo>) {
        *self.processes.lock().unwrap_or_else(PoisonError::into_inner) = processes;
    }

    pub fn push(&self, process: ProcessInfo) {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner).push(process);
    }
}

impl ProcessInspector for MockInspector {
    fn snapshot(&mut self, prefix: &str) -> ProcessSnapshot {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|process| process.name.starts_with(prefix))
            .map(|process| (process.pid, process.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_info_name_from_cmdline() {
        let info = ProcessInfo::new(7, vec!["/usr/bin/python3", "job.py"]);
        assert_eq!(info.name, "python3");
        assert_eq!(info.cmdline, vec!["/usr/bin/python3", "job.py"]);
    }

    #[test]
    fn test_mock_inspector_filters_by_prefix() {
        let inspector = MockInspector::new();
        inspector.set(vec![
            ProcessInfo::new(10, vec!["python", "a.py"]),
            ProcessInfo::new(11, vec!["bash", "-c", "true"]),
            ProcessInfo::new(12, vec!["python3", "b.py"]),
        ]);

        let mut handle = inspector.clone();
        let snapshot = handle.snapshot("python");
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![10, 12]);

        let all = handle.snapshot("");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_mock_inspector_clones_share_table() {
        let inspector = MockInspector::new();
        let mut handle = inspector.clone();
        assert!(handle.snapshot("").is_empty());

        inspector.push(ProcessInfo::new(99, vec!["sleep", "30"]));
        assert!(handle.snapshot("").contains_key(&99));
    }

    #[test]
    fn test_sysinfo_sees_current_process() {
        let mut inspector = SysinfoInspector::new();
        let snapshot = inspector.snapshot("");
        let me = std::process::id();
        let info = snapshot.get(&me).expect("own process missing from snapshot");
        assert!(!info.cmdline.is_empty());
        assert!(info.started_at > 0);
    }

    #[test]
    fn test_sysinfo_prefix_filter_and_cmdline() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let mut inspector = SysinfoInspector::new();

        let matching = inspector.snapshot("sleep");
        let unmatched = inspector.snapshot("no-such-program-prefix");
        child.kill().unwrap();
        child.wait().unwrap();

        let info = matching.get(&child.id()).expect("child missing from snapshot");
        assert_eq!(info.cmdline, vec!["sleep", "30"]);
        assert!(unmatched.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_threads_are_not_processes() {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            ready_tx.send(()).unwrap();
            let _ = done_rx.recv();
        });
        ready_rx.recv().unwrap();

        let me = std::process::id();
        let tids: Vec<u32> = std::fs::read_dir("/proc/self/task")
            .unwrap()
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
            .filter(|tid| *tid != me)
            .collect();
        let snapshot = SysinfoInspector::new().snapshot("");

        done_tx.send(()).unwrap();
        worker.join().unwrap();

        assert!(!tids.is_empty());
        assert!(snapshot.contains_key(&me));
        assert!(tids.iter().all(|tid| !snapshot.contains_key(tid)));
    }
}
