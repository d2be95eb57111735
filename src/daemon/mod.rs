//! Daemon Core - the two supervision loops and their lifecycle
//!
//! The daemon runs:
//! - The supervisor loop, restarting configured programs that are not running
//! - The reaper loop, deleting old files from partitions over their threshold
//!
//! Both loops share nothing but the read-only settings source and stop at
//! their next cycle boundary once shutdown is triggered.

pub mod pidfile;
pub mod shutdown;
pub mod tick;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info};

use crate::reaper::{DiskProbe, Reaper};
use crate::supervisor::{ProcessInspector, Supervisor};

pub use pidfile::PidFile;
pub use shutdown::Shutdown;
pub use tick::{DaemonSummary, ReaperStats, SupervisorStats};

/// A component driven on its own interval.
trait Periodic: Send + 'static {
    type Stats: Default + Send + 'static;

    fn tick(&mut self, stats: &mut Self::Stats);
    fn interval(&self) -> Duration;
}

impl<I: ProcessInspector + 'static> Periodic for Supervisor<I> {
    type Stats = SupervisorStats;

    fn tick(&mut self, stats: &mut SupervisorStats) {
        let report = self.cycle();
        stats.record(&report);
    }

    fn interval(&self) -> Duration {
        Supervisor::interval(self)
    }
}

impl<P: DiskProbe + 'static> Periodic for Reaper<P> {
    type Stats = ReaperStats;

    fn tick(&mut self, stats: &mut ReaperStats) {
        let reports = self.cycle();
        stats.record(&reports);
    }

    fn interval(&self) -> Duration {
        Reaper::interval(self)
    }
}

/// Run `component` until shutdown: cycle, then sleep its interval.
///
/// Cycles run on the blocking pool since spawning and deleting are synchronous.
/// A panicking cycle is logged and the loop carries on with the next one.
async fn run_loop<T: Periodic>(name: &'static str, component: T, shutdown: Shutdown) -> T::Stats {
    let shared = Arc::new(Mutex::new((component, T::Stats::default())));

    while !shutdown.is_triggered() {
        let cycle = {
            let shared = shared.clone();
            tokio::task::spawn_blocking(move || {
                let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let (component, stats) = &mut *guard;
                component.tick(stats);
                component.interval()
            })
        };

        let interval = match cycle.await {
            Ok(interval) => interval,
            Err(e) => {
                error!("{} cycle failed: {}", name, e);
                shared.lock().unwrap_or_else(PoisonError::into_inner).0.interval()
            }
        };

        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("{} loop stopped", name);
    let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut guard.1)
}

/// Run the supervisor and reaper loops concurrently until `shutdown` is triggered.
pub async fn run<I, P>(supervisor: Supervisor<I>, reaper: Reaper<P>, shutdown: Shutdown) -> DaemonSummary
where
    I: ProcessInspector + 'static,
    P: DiskProbe + 'static,
{
    info!("Starting supervisor and reaper loops");
    let supervisor_task = tokio::spawn(run_loop("supervisor", supervisor, shutdown.clone()));
    let reaper_task = tokio::spawn(run_loop("reaper", reaper, shutdown));

    let (supervisor, reaper) = tokio::join!(supervisor_task, reaper_task);
    let summary = DaemonSummary {
        supervisor: supervisor.unwrap_or_else(|e| {
            error!("supervisor loop aborted: {}", e);
            SupervisorStats::default()
        }),
        reaper: reaper.unwrap_or_else(|e| {
            error!("reaper loop aborted: {}", e);
            ReaperStats::default()
        }),
    };

    info!("Daemon stopped: {:?}", summary);
    summary
}
