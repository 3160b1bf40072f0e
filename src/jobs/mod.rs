//! Job orchestration
//!
//! An inbound request becomes an [`ArchiveJob`]: the [`JobOrchestrator`]
//! mints a [`JobId`], returns it to the caller, and runs the
//! [`ArchivePipeline`] (build → publish) on the blocking pool. There is no
//! job ledger; a job's only durable trace is the published archive.

mod id;
mod orchestrator;
mod runner;

pub use id::{IdError, IdGenerator, JobId, UuidV7Generator};
pub use orchestrator::{JobOrchestrator, JobTicket};
pub use runner::{ArchiveJob, ArchivePipeline, JobError};
