//! Document intake: validates a request, consults the access gate and persists
//! the document together with its queued job.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{document_repo, job_repo, Database};
use crate::error::{AccessError, LongformError, Result};
use crate::gate::{AccessGate, GateDecision};
use crate::model::{
    Document, DocumentOptions, Job, JobSnapshot, StructuralRequirements, Topology,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentRequest {
    pub actor: String,
    pub topic: String,
    #[serde(default)]
    pub requirements: StructuralRequirements,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub options: DocumentOptions,
}

impl DocumentRequest {
    pub fn new(actor: &str, topic: &str) -> Self {
        Self {
            actor: actor.to_string(),
            topic: topic.to_string(),
            requirements: StructuralRequirements::default(),
            topology: Topology::Standard,
            options: DocumentOptions::default(),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.actor.trim().is_empty() {
            return Err("actor must not be empty".to_string());
        }
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        let req = &self.requirements;
        if req.target_chars == 0 {
            return Err("targetChars must be positive".to_string());
        }
        if req.min_sections == 0 || req.min_sections > req.max_sections {
            return Err(format!(
                "section bounds are invalid (min {}, max {})",
                req.min_sections, req.max_sections
            ));
        }
        if self.topology == Topology::Comparison {
            let has_competitors = self
                .options
                .comparison
                .as_ref()
                .is_some_and(|c| c.competitors.iter().any(|n| !n.trim().is_empty()));
            if !has_competitors {
                return Err("comparison documents need at least one competitor".to_string());
            }
        }
        Ok(())
    }
}

/// Creates a document and its job (`queued`, `init`). The topology is fixed here
/// for the life of the job.
pub fn create_document(
    db: &Database,
    gate: &dyn AccessGate,
    request: DocumentRequest,
) -> Result<(Document, JobSnapshot)> {
    request.validate().map_err(LongformError::InvalidRequest)?;

    if let GateDecision::Denied { reason } = gate.can_create_job(&request.actor)? {
        return Err(AccessError::Denied { reason }.into());
    }
    let limit = gate.char_limit(&request.actor);
    if request.requirements.target_chars > limit {
        return Err(AccessError::CharLimitExceeded {
            requested: request.requirements.target_chars,
            limit,
        }
        .into());
    }

    let document = Document::new(
        &request.actor,
        request.topic.trim(),
        request.requirements,
        request.topology,
        request.options,
    );
    let job = Job::queued(&document.id, document.topology);

    db.with_tx(|conn| {
        document_repo::insert_in(conn, &document)?;
        job_repo::insert_in(conn, &job)
    })?;

    info!(
        document_id = %document.id,
        job_id = %job.id,
        topology = document.topology.as_str(),
        "Document created"
    );

    Ok((document, JobSnapshot::new(&job, &[])))
}
