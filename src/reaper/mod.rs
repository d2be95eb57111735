//! Disk Reaper - keeps watched partitions below their usage threshold
//!
//! Each cycle re-reads the disk settings, measures every watched partition and,
//! when one is at or over the threshold, deletes the oldest files from the
//! reclaimable directories until it is back under.

pub mod candidates;
pub mod reclaim;
pub mod usage;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::config::{DiskConfig, SettingsSource};

pub use candidates::{Candidate, candidates};
pub use reclaim::{ReclaimOutcome, ReclaimReport, reclaim};
pub use usage::{DiskProbe, DiskUsage, StatvfsProbe, usage_percent};

/// A partition, its threshold, and the directories that may be emptied for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionWatch {
    pub partition: PathBuf,
    pub threshold: f64,
    pub directories: Vec<PathBuf>,
}

impl PartitionWatch {
    pub fn from_config(config: &DiskConfig) -> Vec<Self> {
        let threshold = config.threshold();
        config
            .partitions
            .iter()
            .map(|partition| Self {
                partition: partition.clone(),
                threshold,
                directories: config.delete_file_paths.clone(),
            })
            .collect()
    }
}

/// What one reaper cycle found for a partition
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    pub partition: PathBuf,
    pub usage: f64,
    /// Present when the partition was over threshold
    pub reclaim: Option<ReclaimReport>,
}

pub struct Reaper<P: DiskProbe> {
    settings: Arc<dyn SettingsSource>,
    probe: P,
    interval: Duration,
}

impl<P: DiskProbe> Reaper<P> {
    pub fn new(settings: Arc<dyn SettingsSource>, probe: P) -> Self {
        let interval = settings.disk().poll_interval();
        Self {
            settings,
            probe,
            interval,
        }
    }

    /// Poll interval from the most recent configuration read
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Percentage of `partition` in use; 0 when it cannot be measured.
    pub fn usage(&self, partition: &Path) -> f64 {
        usage_percent(&self.probe, partition)
    }

    pub fn candidates(&self, directories: &[PathBuf]) -> Vec<Candidate> {
        candidates(directories)
    }

    pub fn reclaim(&self, partition: &Path, directories: &[PathBuf], threshold: f64) -> ReclaimReport {
        reclaim(&self.probe, partition, directories, threshold)
    }

    pub fn cycle(&mut self) -> Vec<PartitionReport> {
        let config = self.settings.disk();
        self.interval = config.poll_interval();

        PartitionWatch::from_config(&config)
            .into_iter()
            .map(|watch| {
                let usage = self.usage(&watch.partition);
                debug!("{} is {:.1}% used", watch.partition.display(), usage);

                let reclaim = if usage >= watch.threshold {
                    warn!(
                        "{} is {:.1}% used (threshold {}%), reclaiming space",
                        watch.partition.display(),
                        usage,
                        watch.threshold
                    );
                    Some(self.reclaim(&watch.partition, &watch.directories, watch.threshold))
                } else {
                    None
                };

                PartitionReport {
                    partition: watch.partition,
                    usage,
                    reclaim,
                }
            })
            .collect()
    }
}
