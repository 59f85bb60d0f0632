//! Snapshot returned to callers of the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::{Job, JobStatus, Step, Topology};
use super::section::{Section, SectionStatus};

/// Per-section view inside a [`JobSnapshot`]. Content is omitted (can be large).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub id: String,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_path: Option<String>,
    pub status: SectionStatus,
    pub has_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Section> for SectionSummary {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            index: section.index,
            heading_path: section.heading_path.clone(),
            status: section.status,
            has_content: section.content.is_some(),
            error: section.error.clone(),
        }
    }
}

/// Current state of a job and its sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub document_id: String,
    pub topology: Topology,
    pub status: JobStatus,
    pub step: Step,
    pub progress: u8,
    pub cursor: u32,
    pub total_sections: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub sections: Vec<SectionSummary>,
}

impl JobSnapshot {
    pub fn new(job: &Job, sections: &[Section]) -> Self {
        Self {
            job_id: job.id.clone(),
            document_id: job.document_id.clone(),
            topology: job.topology,
            status: job.status,
            step: job.step,
            progress: job.progress,
            cursor: job.cursor,
            total_sections: sections.len() as u32,
            error: job.error.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            sections: sections.iter().map(SectionSummary::from).collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_summarizes_sections() {
        let job = Job::queued("doc", Topology::Standard);
        let mut written = Section::planned("doc", &job.id, 0, "Intro", 500);
        written.content = Some("Hello".to_string());
        written.status = SectionStatus::Reviewed;
        let pending = Section::planned("doc", &job.id, 1, "Body", 500);

        let snapshot = JobSnapshot::new(&job, &[written, pending]);

        assert_eq!(snapshot.total_sections, 2);
        assert!(snapshot.sections[0].has_content);
        assert!(!snapshot.sections[1].has_content);
        assert_eq!(snapshot.sections[1].status, SectionStatus::Pending);
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let job = Job::queued("doc", Topology::Comparison);
        let json = serde_json::to_value(JobSnapshot::new(&job, &[])).unwrap();
        assert_eq!(json["jobId"], job.id.as_str());
        assert_eq!(json["topology"], "comparison");
        assert_eq!(json["status"], "queued");
        assert_eq!(json["step"], "init");
        assert!(json.get("error").is_none());
    }
}
