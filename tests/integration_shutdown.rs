//! Daemon lifecycle tests against the compiled binary
//!
//! Covers the single-instance lock, SIGTERM shutdown while both loops are
//! sleeping, and the `check` subcommand.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;

const READY_LINE: &str = "Starting supervisor and reaper loops";

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    /// Config with hour-long intervals so both loops are asleep when signalled.
    fn new(programs: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let config = format!(
            "watchdog:\n  interval: 3600\n  programs: {}\ndisk:\n  interval: 3600\n  partitions: []\n  delete_file_paths: []\nlogging:\n  console_log: false\n  directory: {}\n",
            programs,
            temp.path().join("logs").display()
        );
        fs::write(temp.path().join("watchdog.yml"), config).unwrap();
        Self { temp }
    }

    fn config(&self) -> PathBuf {
        self.temp.path().join("watchdog.yml")
    }

    fn pid_file(&self) -> PathBuf {
        self.temp.path().join(".watchdog.pid")
    }

    fn log(&self) -> String {
        fs::read_to_string(self.temp.path().join("logs").join("watchdog.log")).unwrap_or_default()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_watchdog"));
        command
            .arg("--config")
            .arg(self.config())
            .arg("--pid-file")
            .arg(self.pid_file())
            .current_dir(self.temp.path())
            .env_remove("RUST_LOG")
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }

    fn spawn_daemon(&self) -> Child {
        let child = self.command().spawn().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !self.log().contains(READY_LINE) {
            assert!(Instant::now() < deadline, "daemon never became ready");
            sleep(Duration::from_millis(50));
        }
        child
    }
}

fn terminate(child: &mut Child) -> ExitStatus {
    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("daemon ignored SIGTERM");
        }
        sleep(Duration::from_millis(50));
    }
}

#[test]
fn test_sigterm_stops_daemon_and_removes_lock() {
    let fixture = Fixture::new("[]");
    let mut daemon = fixture.spawn_daemon();
    assert_eq!(
        fs::read_to_string(fixture.pid_file()).unwrap().trim(),
        daemon.id().to_string()
    );

    let status = terminate(&mut daemon);

    assert!(status.success(), "exit status {:?}", status);
    assert!(!fixture.pid_file().exists());
    let log = fixture.log();
    assert!(log.contains("Received SIGTERM"));
    assert!(log.contains("Finished Version"));
}

#[test]
fn test_second_instance_exits_cleanly() {
    let fixture = Fixture::new("[]");
    let mut daemon = fixture.spawn_daemon();

    let second = fixture.command().output().unwrap();
    let status = terminate(&mut daemon);

    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("already running"));
    assert!(status.success());
    assert!(!fixture.pid_file().exists());
}

#[test]
fn test_check_reports_programs_without_locking() {
    let fixture = Fixture::new("[\"sleep    30\", [\"sleep\", \"5\"]]");

    let output = fixture.command().arg("check").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("sleep 30"));
    assert!(stdout.contains("skip"));
    assert!(!fixture.pid_file().exists());
}

#[test]
fn test_missing_config_is_fatal() {
    let temp = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_watchdog"))
        .arg("--config")
        .arg(temp.path().join("absent.yml"))
        .arg("--pid-file")
        .arg(temp.path().join(".watchdog.pid"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!temp.path().join(".watchdog.pid").exists());
}
