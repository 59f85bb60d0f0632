use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::Topology;

/// Shape constraints the outline must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StructuralRequirements {
    /// Target length of the whole document body.
    pub target_chars: u32,
    #[serde(default = "default_min_sections")]
    pub min_sections: u32,
    #[serde(default = "default_max_sections")]
    pub max_sections: u32,
    /// Headings the outline should include, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heading_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

fn default_min_sections() -> u32 {
    3
}

fn default_max_sections() -> u32 {
    12
}

impl Default for StructuralRequirements {
    fn default() -> Self {
        Self {
            target_chars: 8000,
            min_sections: default_min_sections(),
            max_sections: default_max_sections(),
            heading_hints: Vec::new(),
            tone: None,
            audience: None,
            keywords: Vec::new(),
        }
    }
}

/// Options for answer-engine oriented output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LlmoOptions {
    /// Close each section with a short question-and-answer pair.
    #[serde(default)]
    pub faq: bool,
    /// Open each section with a one-sentence takeaway.
    #[serde(default)]
    pub summary_box: bool,
    /// Search queries the document should answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_queries: Vec<String>,
}

/// Inputs for the comparison topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComparisonConfig {
    pub competitors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<String>,
}

/// Per-document options. Each recognized option group has its own struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llmo: Option<LlmoOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Who requested the document.
    pub actor: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub requirements: StructuralRequirements,
    pub topology: Topology,
    pub options: DocumentOptions,
    /// Final integrated body; present once the job has integrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_table: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        actor: &str,
        topic: &str,
        requirements: StructuralRequirements,
        topology: Topology,
        options: DocumentOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            topic: topic.to_string(),
            title: None,
            requirements,
            topology,
            options,
            body: None,
            research_notes: None,
            comparison_table: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.body.is_some()
    }

    /// Title if the outline produced one, otherwise the topic.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.topic)
    }
}
