//! Domain types shared by the repositories, the pipeline and the media orchestrator.

pub mod asset;
pub mod consistency;
pub mod document;
pub mod job;
pub mod section;
pub mod snapshot;

pub use asset::{Asset, AssetKind};
pub use consistency::{ConsistencyReport, Finding, FindingKind, Severity};
pub use document::{
    ComparisonConfig, Document, DocumentOptions, LlmoOptions, StructuralRequirements,
};
pub use job::{Job, JobPosition, JobStatus, Step, Topology};
pub use section::{Section, SectionStatus};
pub use snapshot::{JobSnapshot, SectionSummary};

use thiserror::Error;

/// Returned when a persisted label does not name a known variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
