//! Publisher: copies a finished artifact to `<output_root>/<id>.zip`.
//!
//! The copy goes to a dot-prefixed `.partial` staging file in the output
//! root and is renamed over the destination once synced, so readers never
//! observe a truncated archive. Rename is atomic on POSIX filesystems; on
//! platforms without atomic replace the rename is best effort.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::builder::TemporaryArtifact;
use super::types::PublishedArchive;
use crate::jobs::JobId;

const ARCHIVE_EXTENSION: &str = "zip";
const STAGING_SUFFIX: &str = ".partial";

/// Mode of published archives, readable by other users
#[cfg(unix)]
const ARCHIVE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish failed during {operation} ({}): {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PublishError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        PublishError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Publisher {
    output_root: PathBuf,
}

impl Publisher {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Where the archive for `id` is (or will be) visible
    pub fn destination(&self, id: &JobId) -> PathBuf {
        self.output_root
            .join(format!("{id}.{ARCHIVE_EXTENSION}"))
    }

    /// Publish `artifact` under `id`. The artifact is removed on every
    /// exit path, successful or not.
    pub fn publish(
        &self,
        mut artifact: TemporaryArtifact,
        id: &JobId,
    ) -> Result<PublishedArchive, PublishError> {
        let result = self.copy_into_place(&mut artifact, id);
        artifact.discard();
        result
    }

    fn copy_into_place(
        &self,
        artifact: &mut TemporaryArtifact,
        id: &JobId,
    ) -> Result<PublishedArchive, PublishError> {
        let root = &self.output_root;
        let destination = self.destination(id);

        fs::create_dir_all(root).map_err(|err| PublishError::io("create_output_root", root, err))?;

        let prefix = format!(".{id}.");
        let mut staging = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(root)
            .map_err(|err| PublishError::io("create_staging", root, err))?;

        // tempfile creates 0600; fchmod is not subject to the umask
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staging
                .as_file()
                .set_permissions(fs::Permissions::from_mode(ARCHIVE_MODE))
                .map_err(|err| PublishError::io("set_permissions", staging.path(), err))?;
        }

        let artifact_path = artifact.path().to_path_buf();
        let reader = artifact
            .reader()
            .map_err(|err| PublishError::io("rewind_artifact", &artifact_path, err))?;
        let size_bytes = io::copy(reader, staging.as_file_mut())
            .map_err(|err| PublishError::io("copy", staging.path(), err))?;
        staging
            .as_file()
            .sync_all()
            .map_err(|err| PublishError::io("sync", staging.path(), err))?;

        // On failure the staging file is dropped, and with it removed
        staging
            .persist(&destination)
            .map_err(|err| PublishError::io("rename", &destination, err.error))?;

        let modified = fs::metadata(&destination)
            .and_then(|meta| meta.modified())
            .map_err(|err| PublishError::io("stat", &destination, err))?;

        info!(
            job_id = %id,
            path = %destination.display(),
            size_bytes,
            "Archive published"
        );

        Ok(PublishedArchive {
            id: *id,
            path: destination,
            size_bytes,
            modified,
            entries: 0,
            skipped: 0,
        })
    }
}
