//! Age-based sweep of the output tree
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("cannot read sweep root {}: {source}", .root.display())]
    Root {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("sweep task did not complete: {0}")]
    Interrupted(String),
}

/// Sweep statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Regular files inspected
    pub scanned: usize,
    pub deleted: usize,
    pub retained: usize,
    /// Files or subtrees that could not be inspected or removed
    pub failed: usize,
}

/// Delete every regular file under `root` last modified more than `max_age` ago.
pub fn sweep(root: &Path, max_age: Duration) -> Result<SweepStats, SweepError> {
    sweep_at(root, max_age, SystemTime::now())
}

/// [`sweep`] against a fixed clock.
///
/// Directories are never removed. Symlinks are neither followed nor
/// deleted. A missing root is an empty sweep; any other failure to open
/// the root is an error. Everything below the root fails per entry: it is
/// logged, counted in `failed`, and the walk continues.
pub fn sweep_at(root: &Path, max_age: Duration, now: SystemTime) -> Result<SweepStats, SweepError> {
    let mut stats = SweepStats::default();

    info!(root = %root.display(), max_age_secs = max_age.as_secs(), "Cleaning old files");

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) {
                    debug!(root = %root.display(), "Sweep root does not exist yet");
                    return Ok(stats);
                }
                return Err(SweepError::Root {
                    root: root.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                warn!(path = ?err.path(), error = %err, "Cannot walk entry, skipping");
                stats.failed += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        stats.scanned += 1;

        let path = entry.path();
        let modified = match entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Cannot read modification time");
                stats.failed += 1;
                continue;
            }
        };

        // Timestamps in the future count as brand new
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            stats.retained += 1;
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), age_secs = age.as_secs(), "Deleted expired file");
                stats.deleted += 1;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Expired file already removed");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to delete file");
                stats.failed += 1;
            }
        }
    }

    info!(
        scanned = stats.scanned,
        deleted = stats.deleted,
        retained = stats.retained,
        failed = stats.failed,
        "Sweep complete"
    );

    Ok(stats)
}
