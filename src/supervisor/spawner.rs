//! Child spawner module
//!
//! Launches supervised programs and keeps the handles needed to observe their exit.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

use super::program::ProgramSpec;
use crate::error::{Result, WatchdogError};

/// A child this supervisor launched and has not yet seen exit.
#[derive(Debug)]
pub struct StartedProcess {
    spec: ProgramSpec,
    child: Child,
    launched: Instant,
}

impl StartedProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn spec(&self) -> &ProgramSpec {
        &self.spec
    }

    pub fn uptime(&self) -> Duration {
        self.launched.elapsed()
    }

    /// Non-blocking exit check. Reaps the child once it has exited.
    pub fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}

/// Launch `spec` as an independent process.
///
/// Environment and stdio are inherited. The child gets its own process group
/// so an interrupt aimed at the daemon's terminal does not take it down too.
pub fn spawn(spec: &ProgramSpec) -> Result<StartedProcess> {
    let tokens = spec.tokens();
    let (program, args) = tokens
        .split_first()
        .ok_or_else(|| WatchdogError::Spawn("empty command".to_string()))?;

    let child = Command::new(program)
        .args(args)
        .process_group(0)
        .spawn()
        .map_err(|e| WatchdogError::Spawn(format!("{}: {}", spec, e)))?;

    Ok(StartedProcess {
        spec: spec.clone(),
        child,
        launched: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn wait_for_exit(started: &mut StartedProcess) -> ExitStatus {
        for _ in 0..100 {
            if let Some(status) = started.try_exit().unwrap() {
                return status;
            }
            sleep(Duration::from_millis(20));
        }
        panic!("{} did not exit", started.spec());
    }

    #[test]
    fn test_spawn_and_observe_exit() {
        let spec = ProgramSpec::new("true").unwrap();
        let mut started = spawn(&spec).unwrap();
        assert!(started.pid() > 0);
        assert_eq!(started.spec(), &spec);
        assert!(wait_for_exit(&mut started).success());
    }

    #[test]
    fn test_spawn_passes_arguments() {
        let spec = ProgramSpec::new("sh   -c false").unwrap();
        let mut started = spawn(&spec).unwrap();
        assert_eq!(wait_for_exit(&mut started).code(), Some(1));
    }

    #[test]
    fn test_spawn_missing_executable_fails() {
        let spec = ProgramSpec::new("/nonexistent/watchdog-test-binary --flag").unwrap();
        let err = spawn(&spec).unwrap_err();
        assert!(matches!(err, WatchdogError::Spawn(_)));
        assert!(err.to_string().contains("/nonexistent/watchdog-test-binary"));
    }
}
