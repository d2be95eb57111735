//! Per-loop tick bookkeeping
//!
//! Each loop keeps running totals of what its cycles did; the totals are
//! logged when the daemon stops.

use crate::reaper::{PartitionReport, ReclaimOutcome};
use crate::supervisor::CycleReport;

/// Totals for the supervisor loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Number of cycles run
    pub cycles: u64,
    /// Programs launched
    pub started: u64,
    /// Launch attempts that failed
    pub failed: u64,
    /// Own children seen exiting
    pub reaped: u64,
}

impl SupervisorStats {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.started += report.started as u64;
        self.failed += report.failed as u64;
        self.reaped += report.reaped as u64;
    }
}

/// Totals for the reaper loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaperStats {
    /// Number of cycles run
    pub cycles: u64,
    /// Times a partition was found over threshold
    pub reclaims: u64,
    /// Files deleted
    pub deleted: u64,
    /// Files that could not be deleted
    pub delete_failures: u64,
    pub freed_bytes: u64,
    /// Reclaims that ran out of files while still over threshold
    pub exhausted: u64,
}

impl ReaperStats {
    pub fn record(&mut self, reports: &[PartitionReport]) {
        self.cycles += 1;
        for reclaim in reports.iter().filter_map(|report| report.reclaim.as_ref()) {
            self.reclaims += 1;
            self.deleted += reclaim.deleted.len() as u64;
            self.delete_failures += reclaim.failed as u64;
            self.freed_bytes += reclaim.freed_bytes;
            if reclaim.outcome != ReclaimOutcome::BelowThreshold {
                self.exhausted += 1;
            }
        }
    }
}

/// Totals for both loops at shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonSummary {
    pub supervisor: SupervisorStats,
    pub reaper: ReaperStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaper::ReclaimReport;
    use std::path::PathBuf;

    #[test]
    fn test_supervisor_stats_accumulate() {
        let mut stats = SupervisorStats::default();
        stats.record(&CycleReport {
            running: 1,
            started: 2,
            failed: 1,
            reaped: 0,
        });
        stats.record(&CycleReport {
            running: 3,
            started: 0,
            failed: 0,
            reaped: 1,
        });
        assert_eq!(
            stats,
            SupervisorStats {
                cycles: 2,
                started: 2,
                failed: 1,
                reaped: 1
            }
        );
    }

    #[test]
    fn test_reaper_stats_accumulate() {
        let reclaimed = ReclaimReport {
            deleted: vec![PathBuf::from("/d/a"), PathBuf::from("/d/b")],
            failed: 1,
            freed_bytes: 2048,
            final_usage: Some(80.0),
            outcome: ReclaimOutcome::BelowThreshold,
        };
        let empty = ReclaimReport {
            deleted: Vec::new(),
            failed: 0,
            freed_bytes: 0,
            final_usage: None,
            outcome: ReclaimOutcome::NoCandidates,
        };
        let reports = vec![
            PartitionReport {
                partition: PathBuf::from("/"),
                usage: 95.0,
                reclaim: Some(reclaimed),
            },
            PartitionReport {
                partition: PathBuf::from("/data"),
                usage: 40.0,
                reclaim: None,
            },
            PartitionReport {
                partition: PathBuf::from("/mnt"),
                usage: 99.0,
                reclaim: Some(empty),
            },
        ];

        let mut stats = ReaperStats::default();
        stats.record(&reports);
        stats.record(&[]);

        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.reclaims, 2);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.delete_failures, 1);
        assert_eq!(stats.freed_bytes, 2048);
        assert_eq!(stats.exhausted, 1);
    }
}
