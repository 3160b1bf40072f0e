//! Request and response bodies for the archive service.
//!
//! `POST /zip` accepts a [`ZipRequest`]:
//!
//! ```json
//! {
//!   "filenames": [
//!     { "name": "reports/2024/q1.pdf", "ext": "pdf", "alias": "first-quarter" }
//!   ]
//! }
//! ```
//!
//! and answers with a [`ZipResponse`] carrying the `file_id` under which the
//! archive will appear once the background job finishes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::archive::MemberRequest;
use crate::retention::SweepStats;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ZipRequest {
    #[serde(default)]
    pub filenames: Vec<MemberRequest>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ZipResponse {
    pub file_id: String,
}

/// Existence probe result for a published archive
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ArchiveStatusResponse {
    pub file_id: String,
    pub size_bytes: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub modified_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CleanupResponse {
    pub status: String,
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl From<SweepStats> for CleanupResponse {
    fn from(stats: SweepStats) -> Self {
        Self {
            status: "ok".to_string(),
            scanned: stats.scanned,
            deleted: stats.deleted,
            failed: stats.failed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
