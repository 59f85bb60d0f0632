use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseLabelError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Generating,
    Written,
    Reviewed,
    Failed,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Written => "written",
            Self::Reviewed => "reviewed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SectionStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "written" => Ok(Self::Written),
            "reviewed" => Ok(Self::Reviewed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseLabelError::new("section status", s)),
        }
    }
}

/// One planned unit of a document, addressed by its stable `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub document_id: String,
    /// Owning job while generation is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_path: Option<String>,
    pub planned_chars: u32,
    pub status: SectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Consistency checker notes, kept after review for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Section {
    /// A pending section as created at the end of the outline step.
    pub fn planned(
        document_id: &str,
        job_id: &str,
        index: u32,
        heading_path: &str,
        planned_chars: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            job_id: Some(job_id.to_string()),
            index,
            heading_path: Some(heading_path.to_string()),
            planned_chars,
            status: SectionStatus::Pending,
            content: None,
            consistency: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_reviewed(&self) -> bool {
        self.status == SectionStatus::Reviewed
    }

    /// Heading text used in prompts and rendering, falling back to a positional label.
    pub fn heading(&self) -> String {
        self.heading_path
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| format!("Section {}", self.index + 1))
    }
}
