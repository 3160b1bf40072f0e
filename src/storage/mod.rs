//! Member resolution against the fixed storage root
//!
//! A member's `name` is a relative path under the storage root. Absence is an
//! expected outcome (never uploaded, or already expired), so every failure is
//! reported as a typed [`ResolveError`] for the caller to record and skip.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

use crate::archive::MemberRequest;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid source name: {0:?}")]
    InvalidName(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("cannot open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Storage result type
pub type Result<T> = std::result::Result<T, ResolveError>;

/// An opened, readable member source
#[derive(Debug)]
pub struct ResolvedMember {
    pub path: PathBuf,
    pub file: File,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Read-only view of the storage root on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the member's source file for reading.
    pub fn resolve(&self, member: &MemberRequest) -> Result<ResolvedMember> {
        let path = self.source_path(&member.name)?;

        let file = File::open(&path).map_err(|err| map_io_error(&path, err))?;
        let metadata = file.metadata().map_err(|err| map_io_error(&path, err))?;

        if !metadata.is_file() {
            return Err(ResolveError::NotAFile(path));
        }

        tracing::debug!(path = %path.display(), size = metadata.len(), "Resolved member");

        Ok(ResolvedMember {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            file,
            path,
        })
    }

    /// Joins `name` onto the root after rejecting anything that could
    /// escape it (absolute paths, drive prefixes, `..`).
    pub fn source_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let mut has_normal = false;

        for component in relative.components() {
            match component {
                Component::Normal(_) => has_normal = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ResolveError::InvalidName(name.to_string()));
                }
            }
        }

        if !has_normal || name.contains('\0') {
            return Err(ResolveError::InvalidName(name.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

fn map_io_error(path: &Path, err: io::Error) -> ResolveError {
    match err.kind() {
        io::ErrorKind::NotFound => ResolveError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => ResolveError::PermissionDenied(path.to_path_buf()),
        _ => ResolveError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    }
}
