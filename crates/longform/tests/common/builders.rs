//! Builders for requests and settings used across integration tests.

#![allow(dead_code)]

use std::time::Duration;

use longform::config::{ImageSize, MediaConfig};
use longform::model::{ComparisonConfig, Topology};
use longform::{DocumentRequest, PipelineSettings};

pub fn standard_request(topic: &str) -> DocumentRequest {
    DocumentRequest::new("tester", topic)
}

pub fn comparison_request(topic: &str, competitors: &[&str]) -> DocumentRequest {
    let mut request = DocumentRequest::new("tester", topic);
    request.topology = Topology::Comparison;
    request.options.comparison = Some(ComparisonConfig {
        competitors: competitors.iter().map(|c| c.to_string()).collect(),
        criteria: vec!["throughput".to_string()],
    });
    request
}

/// Default settings with a short lock wait so contention tests stay fast.
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        lock_wait: Duration::from_secs(5),
        ..PipelineSettings::default()
    }
}

pub fn media_step_settings() -> PipelineSettings {
    PipelineSettings {
        run_media_step: true,
        ..test_settings()
    }
}

/// No pacing and small images.
pub fn test_media_config() -> MediaConfig {
    MediaConfig {
        pacing_ms: 0,
        banner_size: ImageSize {
            width: 64,
            height: 32,
        },
        diagram_size: ImageSize {
            width: 32,
            height: 32,
        },
    }
}
