use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use super::sweeper::{SweepError, SweepStats, sweep};
use crate::config::Config;
use crate::observability::Metrics;

/// What to sweep and how old files may get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub root: PathBuf,
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(root: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
        }
    }

    /// Sweeps the archive output root with the configured window
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.storage.output_root,
            config.retention.max_age.as_duration(),
        )
    }

    /// One blocking sweep
    pub fn sweep(&self) -> Result<SweepStats, SweepError> {
        sweep(&self.root, self.max_age)
    }
}

/// Run one sweep on the blocking pool and record the outcome
pub async fn sweep_blocking(
    policy: Arc<RetentionPolicy>,
    metrics: Arc<Metrics>,
) -> Result<SweepStats, SweepError> {
    let result = tokio::task::spawn_blocking(move || policy.sweep())
        .await
        .map_err(|err| SweepError::Interrupted(err.to_string()))
        .and_then(|result| result);

    match &result {
        Ok(stats) => metrics.sweep_completed(stats.deleted),
        Err(err) => {
            metrics.sweep_failed();
            error!(error = %err, "Sweep failed");
        }
    }
    result
}

/// Process-wide periodic trigger for the sweep
pub struct RetentionScheduler {
    policy: Arc<RetentionPolicy>,
    interval: Duration,
    run_immediately: bool,
    metrics: Arc<Metrics>,
}

impl RetentionScheduler {
    pub fn new(policy: Arc<RetentionPolicy>, interval: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            policy,
            interval,
            run_immediately: false,
            metrics,
        }
    }

    pub fn from_config(config: &Config, policy: Arc<RetentionPolicy>, metrics: Arc<Metrics>) -> Self {
        Self::new(policy, config.retention.sweep_interval.as_duration(), metrics)
            .run_immediately(config.retention.sweep_on_startup)
    }

    /// Fire the first sweep right away instead of after one interval
    pub fn run_immediately(mut self, enabled: bool) -> Self {
        self.run_immediately = enabled;
        self
    }

    /// Spawn the ticker task. Abort the handle to stop it.
    pub fn start(self) -> JoinHandle<()> {
        // interval_at panics on a zero period
        let period = self.interval.max(Duration::from_millis(1));
        let first = if self.run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };

        info!(
            root = %self.policy.root.display(),
            interval_secs = period.as_secs(),
            max_age_secs = self.policy.max_age.as_secs(),
            "Retention scheduler started"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                info!("Running scheduled sweep");
                // Failures are logged and counted inside; the schedule keeps going
                let _ = sweep_blocking(Arc::clone(&self.policy), Arc::clone(&self.metrics)).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn write_expired(path: &std::path::Path) {
        fs::write(path, b"old").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3_600))
            .unwrap();
    }

    #[test]
    fn policy_from_config_targets_output_root() {
        let mut config = Config::default();
        config.storage.output_root = PathBuf::from("/app/output");

        let policy = RetentionPolicy::from_config(&config);
        assert_eq!(policy.root, PathBuf::from("/app/output"));
        assert_eq!(policy.max_age, Duration::from_secs(7 * 86_400));
    }

    #[tokio::test]
    async fn sweep_blocking_records_metrics() {
        let dir = TempDir::new().unwrap();
        write_expired(&dir.path().join("a.zip"));
        let metrics = Arc::new(Metrics::new());
        let policy = Arc::new(RetentionPolicy::new(dir.path(), Duration::from_secs(60)));

        let stats = sweep_blocking(policy, Arc::clone(&metrics)).await.unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(metrics.snapshot().sweeps_run, 1);
        assert_eq!(metrics.snapshot().files_swept, 1);
    }

    #[tokio::test]
    async fn scheduler_sweeps_periodically() {
        let dir = TempDir::new().unwrap();
        let metrics = Arc::new(Metrics::new());
        let policy = Arc::new(RetentionPolicy::new(dir.path(), Duration::from_secs(60)));

        let handle = RetentionScheduler::new(policy, Duration::from_millis(50), Arc::clone(&metrics))
            .start();

        let expired = dir.path().join("late.zip");
        write_expired(&expired);

        let deadline = Instant::now() + Duration::from_secs(5);
        while expired.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(!expired.exists());
        assert!(metrics.snapshot().sweeps_run >= 1);
    }

    #[tokio::test]
    async fn scheduler_waits_one_interval_before_first_sweep() {
        let dir = TempDir::new().unwrap();
        let expired = dir.path().join("a.zip");
        write_expired(&expired);
        let metrics = Arc::new(Metrics::new());
        let policy = Arc::new(RetentionPolicy::new(dir.path(), Duration::from_secs(60)));

        let handle = RetentionScheduler::new(policy, Duration::from_secs(3_600), Arc::clone(&metrics))
            .start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(expired.exists());
        assert_eq!(metrics.snapshot().sweeps_run, 0);
    }
}
