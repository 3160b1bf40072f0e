use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Request identifier; also the published archive's file stem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(JobId)
    }
}

#[derive(Debug, Error)]
pub enum IdError {
    #[error("identifier source unavailable: {0}")]
    Unavailable(String),
}

/// Mints request identifiers. Must be cheap, non-blocking and safe to call
/// from many threads at once.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<JobId, IdError>;
}

/// Time-ordered UUIDv7 with a random tail
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> Result<JobId, IdError> {
        Ok(JobId(Uuid::now_v7()))
    }
}
