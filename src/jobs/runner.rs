//! Archive pipeline: build, then publish, for one job

use chrono::{DateTime, Utc};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use super::id::JobId;
use crate::archive::{
    ArchiveBuilder, BuildError, MemberRequest, PublishError, PublishedArchive, Publisher,
};
use crate::config::StorageConfig;
use crate::storage::LocalStorage;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("job task did not complete: {0}")]
    Interrupted(String),
}

/// One accepted request. Immutable once created.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub id: JobId,
    pub members: Vec<MemberRequest>,
    pub started_at: DateTime<Utc>,
}

impl ArchiveJob {
    pub fn new(id: JobId, members: Vec<MemberRequest>) -> Self {
        Self {
            id,
            members,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchivePipeline {
    builder: ArchiveBuilder,
    publisher: Publisher,
}

impl ArchivePipeline {
    pub fn new(builder: ArchiveBuilder, publisher: Publisher) -> Self {
        Self { builder, publisher }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        let builder = ArchiveBuilder::new(LocalStorage::new(&storage.source_root))
            .with_temp_dir(storage.temp_dir.clone());
        Self::new(builder, Publisher::new(&storage.output_root))
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run the whole job on the current thread. Blocking.
    pub fn run(&self, job: &ArchiveJob) -> Result<PublishedArchive, JobError> {
        let start = Instant::now();

        let report = self.builder.build(&job.members)?;
        let entries = report.entries.len();
        let skipped = report.skipped.len();
        info!(job_id = %job.id, entries, skipped, "Archive built");

        let published = self.publisher.publish(report.artifact, &job.id)?;

        info!(
            job_id = %job.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Zip execution finished"
        );

        Ok(PublishedArchive {
            entries,
            skipped,
            ..published
        })
    }
}
