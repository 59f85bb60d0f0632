use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseLabelError;

/// Image pools attached to a document. Each pool is capped independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Banner,
    Diagram,
}

impl AssetKind {
    pub const BANNER_CAP: u32 = 4;
    pub const DIAGRAM_CAP: u32 = 10;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "BANNER",
            Self::Diagram => "DIAGRAM",
        }
    }

    pub fn cap(&self) -> u32 {
        match self {
            Self::Banner => Self::BANNER_CAP,
            Self::Diagram => Self::DIAGRAM_CAP,
        }
    }

    /// Directory name used under the document's asset folder.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Banner => "banners",
            Self::Diagram => "diagrams",
        }
    }
}

impl FromStr for AssetKind {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BANNER" => Ok(Self::Banner),
            "DIAGRAM" => Ok(Self::Diagram),
            _ => Err(ParseLabelError::new("asset kind", s)),
        }
    }
}

/// A stored image belonging to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub document_id: String,
    pub kind: AssetKind,
    pub prompt: String,
    /// Banner pattern name or diagram title.
    pub description: String,
    pub file_path: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
