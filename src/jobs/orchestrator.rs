use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{error, info, info_span};

use super::id::{IdError, IdGenerator, JobId, UuidV7Generator};
use super::runner::{ArchiveJob, ArchivePipeline, JobError};
use crate::archive::{MemberRequest, PublishedArchive};
use crate::observability::Metrics;

/// Handle to a dispatched job. Dropping it does not cancel the job.
#[derive(Debug)]
pub struct JobTicket {
    pub id: JobId,
    pub handle: JoinHandle<Result<PublishedArchive, JobError>>,
}

impl JobTicket {
    /// Wait for the background job to finish
    pub async fn wait(self) -> Result<PublishedArchive, JobError> {
        self.handle
            .await
            .map_err(|err| JobError::Interrupted(err.to_string()))?
    }
}

/// Entry point the transport layer calls into.
///
/// Mints an id, hands back control immediately, and runs the
/// build → publish chain on Tokio's blocking pool. Jobs share no mutable
/// state: each has its own id, temporary file and destination.
pub struct JobOrchestrator {
    ids: Arc<dyn IdGenerator>,
    pipeline: Arc<ArchivePipeline>,
    metrics: Arc<Metrics>,
}

impl JobOrchestrator {
    pub fn new(pipeline: ArchivePipeline, metrics: Arc<Metrics>) -> Self {
        Self {
            ids: Arc::new(UuidV7Generator),
            pipeline: Arc::new(pipeline),
            metrics,
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn pipeline(&self) -> &ArchivePipeline {
        &self.pipeline
    }

    /// Accept a request and return its id; the archive appears later.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, members: Vec<MemberRequest>) -> Result<JobId, IdError> {
        self.dispatch(members).map(|ticket| ticket.id)
    }

    /// Like [`submit`](Self::submit), but keeps the join handle.
    pub fn dispatch(&self, members: Vec<MemberRequest>) -> Result<JobTicket, IdError> {
        let id = self.ids.next_id()?;
        let job = ArchiveJob::new(id, members);
        self.metrics.archive_requested();

        info!(job_id = %id, members = job.members.len(), "Archive job accepted");

        let pipeline = Arc::clone(&self.pipeline);
        let metrics = Arc::clone(&self.metrics);
        let handle = tokio::task::spawn_blocking(move || execute(&pipeline, &metrics, job));

        Ok(JobTicket { id, handle })
    }
}

fn execute(
    pipeline: &ArchivePipeline,
    metrics: &Metrics,
    job: ArchiveJob,
) -> Result<PublishedArchive, JobError> {
    let span = info_span!("archive_job", job_id = %job.id);
    let _enter = span.enter();
    let start = Instant::now();

    let result = pipeline.run(&job);
    match &result {
        Ok(published) => metrics.archive_published(published.skipped),
        Err(err) => {
            metrics.archive_failed();
            error!(
                error = %err,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Archive job failed"
            );
        }
    }
    result
}
