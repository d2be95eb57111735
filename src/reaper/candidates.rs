//! Reclaimable file discovery.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::SystemTime;

use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A regular file that may be deleted to free space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path under the canonical configured directory
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Every regular file under `directories`, oldest modification time first.
///
/// Symlinks are neither followed nor returned, so the walk stays inside each
/// configured tree. Missing directories are reported and skipped.
pub fn candidates(directories: &[PathBuf]) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for dir in directories {
        let root = match dir.canonicalize() {
            Ok(root) if root.is_dir() => root,
            Ok(_) => {
                warn!("{} isn't a directory, skipping", dir.display());
                continue;
            }
            Err(e) => {
                warn!("Cannot scan {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry_result in WalkDir::new(&root).follow_links(false).min_depth(1) {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if let Some(candidate) = inspect(entry)
                && seen.insert(candidate.path.clone())
            {
                found.push(candidate);
            }
        }
    }

    found.sort_by_key(|candidate| candidate.modified);
    found
}

fn inspect(entry: DirEntry) -> Option<Candidate> {
    if !entry.file_type().is_file() {
        return None;
    }
    let metadata = entry.metadata().ok()?;

    Some(Candidate {
        modified: metadata.modified().ok()?,
        size: metadata.len(),
        path: entry.into_path(),
    })
}
