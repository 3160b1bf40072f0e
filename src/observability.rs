//! Logging setup and in-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    archives_requested: AtomicU64,
    archives_published: AtomicU64,
    archives_failed: AtomicU64,
    members_skipped: AtomicU64,
    sweeps_run: AtomicU64,
    sweeps_failed: AtomicU64,
    files_swept: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive_requested(&self) {
        self.archives_requested.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "archives_requested", "Metric incremented");
    }

    pub fn archive_published(&self, skipped: usize) {
        self.archives_published.fetch_add(1, Ordering::Relaxed);
        self.members_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        tracing::debug!(counter = "archives_published", "Metric incremented");
    }

    pub fn archive_failed(&self) {
        self.archives_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "archives_failed", "Metric incremented");
    }

    pub fn sweep_completed(&self, deleted: usize) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.files_swept.fetch_add(deleted as u64, Ordering::Relaxed);
        tracing::debug!(counter = "sweeps_run", "Metric incremented");
    }

    pub fn sweep_failed(&self) {
        self.sweeps_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "sweeps_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            archives_requested: self.archives_requested.load(Ordering::Relaxed),
            archives_published: self.archives_published.load(Ordering::Relaxed),
            archives_failed: self.archives_failed.load(Ordering::Relaxed),
            members_skipped: self.members_skipped.load(Ordering::Relaxed),
            sweeps_run: self.sweeps_run.load(Ordering::Relaxed),
            sweeps_failed: self.sweeps_failed.load(Ordering::Relaxed),
            files_swept: self.files_swept.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub archives_requested: u64,
    pub archives_published: u64,
    pub archives_failed: u64,
    pub members_skipped: u64,
    pub sweeps_run: u64,
    pub sweeps_failed: u64,
    pub files_swept: u64,
}
