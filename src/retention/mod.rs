//! Retention for published archives
//!
//! The sweep walks the output root and deletes regular files whose
//! modification time is older than the retention window (7 days by
//! default). It runs on a fixed period via [`RetentionScheduler`] and on
//! demand via `GET|POST /clean-old` or `zipbox sweep`.
//!
//! No locking is shared with in-flight jobs: every job writes its own
//! uniquely named files, and a file younger than the window is never
//! touched, so an archive being published cannot be swept.

mod scheduler;
mod sweeper;

pub use scheduler::{RetentionPolicy, RetentionScheduler, sweep_blocking};
pub use sweeper::{SweepError, SweepStats, sweep, sweep_at};
