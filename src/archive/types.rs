use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

use super::names::EntryNameError;
use crate::jobs::JobId;
use crate::storage::ResolveError;

/// One file requested for inclusion in an archive.
///
/// Wire format is `{"name": ..., "ext": ..., "alias": ...}`. The entry
/// inside the archive is named `alias.ext`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemberRequest {
    /// Relative path under the storage root
    pub name: String,
    pub ext: String,
    pub alias: String,
}

impl MemberRequest {
    pub fn new(name: impl Into<String>, ext: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ext: ext.into(),
            alias: alias.into(),
        }
    }
}

/// Why a member was left out of an archive
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Unresolved(#[from] ResolveError),

    #[error(transparent)]
    InvalidEntryName(#[from] EntryNameError),

    #[error("duplicate entry name {0:?}")]
    DuplicateEntry(String),

    #[error("failed to read source: {0}")]
    ReadFailed(#[source] io::Error),
}

#[derive(Debug)]
pub struct SkippedMember {
    pub member: MemberRequest,
    pub reason: SkipReason,
}

/// A finished archive, visible at `<output_root>/<id>.zip`
#[derive(Debug, Clone)]
pub struct PublishedArchive {
    pub id: JobId,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
    pub entries: usize,
    pub skipped: usize,
}
