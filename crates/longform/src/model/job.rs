use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseLabelError;

/// Overall job status. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl FromStr for JobStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(ParseLabelError::new("job status", s)),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage label. `Research` and `Table` only occur in the comparison topology.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Init,
    Outline,
    Research,
    Sections,
    Table,
    Integrate,
    Media,
    Done,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Outline => "outline",
            Self::Research => "research",
            Self::Sections => "sections",
            Self::Table => "table",
            Self::Integrate => "integrate",
            Self::Media => "media",
            Self::Done => "done",
        }
    }
}

impl FromStr for Step {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "outline" => Ok(Self::Outline),
            "research" => Ok(Self::Research),
            "sections" => Ok(Self::Sections),
            "table" => Ok(Self::Table),
            "integrate" => Ok(Self::Integrate),
            "media" => Ok(Self::Media),
            "done" => Ok(Self::Done),
            _ => Err(ParseLabelError::new("step", s)),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job topology, fixed when the job is created.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    #[default]
    Standard,
    Comparison,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Comparison => "comparison",
        }
    }
}

impl FromStr for Topology {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "comparison" => Ok(Self::Comparison),
            _ => Err(ParseLabelError::new("topology", s)),
        }
    }
}

/// Durable record of one document's generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub document_id: String,
    pub topology: Topology,
    pub status: JobStatus,
    pub step: Step,
    /// Percentage in `0..=100`.
    pub progress: u8,
    /// Index of the next section to process.
    pub cursor: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly created job: `queued` at `init`.
    pub fn queued(document_id: &str, topology: Topology) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            topology,
            status: JobStatus::Queued,
            step: Step::Init,
            progress: 0,
            cursor: 0,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn position(&self) -> JobPosition {
        JobPosition {
            status: self.status,
            step: self.step,
            cursor: self.cursor,
        }
    }

    /// Raises progress, never lowering it.
    pub fn raise_progress(&mut self, computed: u8) {
        self.progress = self.progress.max(computed.min(100));
    }

    /// Records a fatal step failure. Cursor and step are kept so a retry resumes in place.
    pub fn fail(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        self.status = JobStatus::Error;
        self.error = Some(message.into());
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Done;
        self.step = Step::Done;
        self.progress = 100;
        self.error = None;
        self.finished_at = Some(now);
        self.updated_at = now;
    }
}

/// The part of a job that identifies where it stands in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPosition {
    pub status: JobStatus,
    pub step: Step,
    pub cursor: u32,
}
