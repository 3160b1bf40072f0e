use std::sync::Arc;

use crate::config::Config;
use crate::jobs::{ArchivePipeline, IdGenerator, JobOrchestrator};
use crate::observability::Metrics;
use crate::retention::RetentionPolicy;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub retention: Arc<RetentionPolicy>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let metrics = Arc::new(Metrics::new());
        let pipeline = ArchivePipeline::from_config(&config.storage);
        let orchestrator = JobOrchestrator::new(pipeline, Arc::clone(&metrics));
        Self::assemble(config, orchestrator, metrics)
    }

    /// Same as [`new`](Self::new) with a custom id source
    pub fn with_id_generator(config: Config, ids: Arc<dyn IdGenerator>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let pipeline = ArchivePipeline::from_config(&config.storage);
        let orchestrator =
            JobOrchestrator::new(pipeline, Arc::clone(&metrics)).with_id_generator(ids);
        Self::assemble(config, orchestrator, metrics)
    }

    fn assemble(config: Config, orchestrator: JobOrchestrator, metrics: Arc<Metrics>) -> Self {
        Self {
            retention: Arc::new(RetentionPolicy::from_config(&config)),
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            metrics,
        }
    }
}
