//! Partition usage measurement.

use std::path::{Path, PathBuf};

use log::error;
use nix::sys::statvfs::statvfs;

use crate::error::{Result, WatchdogError};

/// Disk usage information.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    /// Total disk space in bytes.
    pub total_bytes: u64,

    /// Used disk space in bytes.
    pub used_bytes: u64,

    /// Space available to unprivileged users in bytes.
    pub available_bytes: u64,

    /// Path that was measured.
    pub mount_point: PathBuf,
}

impl DiskUsage {
    /// Percentage in use: `100 × (1 − available/total)`, clamped to [0, 100].
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let free = self.available_bytes as f64 / self.total_bytes as f64;
        (100.0 * (1.0 - free)).clamp(0.0, 100.0)
    }
}

/// Source of partition usage figures.
pub trait DiskProbe: Send {
    fn measure(&self, path: &Path) -> Result<DiskUsage>;
}

impl<F> DiskProbe for F
where
    F: Fn(&Path) -> Result<DiskUsage> + Send,
{
    fn measure(&self, path: &Path) -> Result<DiskUsage> {
        self(path)
    }
}

/// Probe backed by statvfs(3).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl DiskProbe for StatvfsProbe {
    #[allow(clippy::unnecessary_cast)]
    fn measure(&self, path: &Path) -> Result<DiskUsage> {
        let stat = statvfs(path).map_err(|e| WatchdogError::Disk(format!("statvfs {}: {}", path.display(), e)))?;

        let fragment = stat.fragment_size() as u64;
        let total_bytes = stat.blocks() as u64 * fragment;
        let free_bytes = stat.blocks_free() as u64 * fragment;
        let available_bytes = stat.blocks_available() as u64 * fragment;

        Ok(DiskUsage {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
            available_bytes,
            mount_point: path.to_path_buf(),
        })
    }
}

/// Usage percentage of `partition`, or 0 when it cannot be measured.
pub fn usage_percent<P: DiskProbe + ?Sized>(probe: &P, partition: &Path) -> f64 {
    match probe.measure(partition) {
        Ok(usage) => usage.usage_percent(),
        Err(e) => {
            error!("Cannot read usage of {}, treating as 0%: {}", partition.display(), e);
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(total: u64, available: u64) -> DiskUsage {
        DiskUsage {
            total_bytes: total,
            used_bytes: total - available,
            available_bytes: available,
            mount_point: PathBuf::from("/"),
        }
    }

    #[test]
    fn test_usage_percent() {
        assert!((usage(1000, 400).usage_percent() - 60.0).abs() < 1e-9);
        assert_eq!(usage(1000, 1000).usage_percent(), 0.0);
        assert_eq!(usage(1000, 0).usage_percent(), 100.0);
    }

    #[test]
    fn test_usage_zero_total() {
        assert_eq!(usage(0, 0).usage_percent(), 0.0);
    }

    #[test]
    fn test_usage_clamped_when_available_exceeds_total() {
        let odd = DiskUsage {
            total_bytes: 100,
            used_bytes: 0,
            available_bytes: 150,
            mount_point: PathBuf::from("/"),
        };
        assert_eq!(odd.usage_percent(), 0.0);
    }

    #[test]
    fn test_statvfs_root() {
        let usage = StatvfsProbe.measure(Path::new("/")).unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.available_bytes <= usage.total_bytes);
        let percent = usage.usage_percent();
        assert!((0.0..=100.0).contains(&percent));
    }

    #[test]
    fn test_unreachable_partition_is_zero_percent() {
        let percent = usage_percent(&StatvfsProbe, Path::new("/nonexistent/watchdog/mount"));
        assert_eq!(percent, 0.0);
    }

    #[test]
    fn test_closure_probe() {
        let probe = |_: &Path| -> Result<DiskUsage> { Ok(usage(100, 5)) };
        assert!((usage_percent(&probe, Path::new("/data")) - 95.0).abs() < 1e-9);
    }
}
