use std::time::Duration;

use crate::config::{Config, ConsistencyConfig, DigestConfig};

/// The slice of [`Config`] the orchestrator needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub consistency: ConsistencyConfig,
    pub digest: DigestConfig,
    pub run_media_step: bool,
    pub lock_wait: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            consistency: config.consistency.clone(),
            digest: config.digest.clone(),
            run_media_step: config.pipeline.run_media_step,
            lock_wait: config.pipeline.lock_wait(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
