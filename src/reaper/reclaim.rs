//! Oldest-first deletion until a partition drops below its threshold.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::candidates::candidates;
use super::usage::{DiskProbe, usage_percent};

/// Why reclamation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// Usage dropped below the threshold
    BelowThreshold,
    /// Every candidate was tried and usage is still at or above the threshold
    Exhausted,
    /// The configured directories held nothing to delete
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReclaimReport {
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed
    pub failed: usize,
    pub freed_bytes: u64,
    /// Usage measured after the last deletion
    pub final_usage: Option<f64>,
    pub outcome: ReclaimOutcome,
}

/// Delete files from `directories`, oldest first, re-measuring `partition` after
/// each one and stopping as soon as usage is below `threshold`.
pub fn reclaim<P: DiskProbe + ?Sized>(
    probe: &P,
    partition: &Path,
    directories: &[PathBuf],
    threshold: f64,
) -> ReclaimReport {
    let files = candidates(directories);
    let mut report = ReclaimReport {
        deleted: Vec::new(),
        failed: 0,
        freed_bytes: 0,
        final_usage: None,
        outcome: ReclaimOutcome::NoCandidates,
    };

    if files.is_empty() {
        warn!(
            "No files to delete under {:?} to free space on {}",
            directories,
            partition.display()
        );
        return report;
    }

    for file in files {
        if let Err(e) = fs::remove_file(&file.path) {
            warn!("Failed to delete {}: {}", file.path.display(), e);
            report.failed += 1;
            continue;
        }
        info!("Deleted {} ({} bytes)", file.path.display(), file.size);
        report.freed_bytes += file.size;
        report.deleted.push(file.path);

        let usage = usage_percent(probe, partition);
        report.final_usage = Some(usage);
        if usage < threshold {
            info!(
                "{} down to {:.1}% after deleting {} files",
                partition.display(),
                usage,
                report.deleted.len()
            );
            report.outcome = ReclaimOutcome::BelowThreshold;
            return report;
        }
    }

    report.outcome = ReclaimOutcome::Exhausted;
    warn!(
        "{} still at {:.1}% (threshold {}%) after trying every candidate",
        partition.display(),
        report.final_usage.unwrap_or_else(|| usage_percent(probe, partition)),
        threshold
    );
    report
}
