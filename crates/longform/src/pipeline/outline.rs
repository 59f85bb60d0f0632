//! Outline parsing and normalization.

use serde::Deserialize;
use tracing::warn;

use crate::model::StructuralRequirements;
use crate::provider::GenerationOutput;

use super::error::PipelineError;

/// Smallest per-section length accepted from the model.
const MIN_PLANNED_CHARS: u32 = 200;

#[derive(Debug, Deserialize)]
struct OutlineResponse {
    #[serde(default)]
    title: Option<String>,
    sections: Vec<OutlineItem>,
}

#[derive(Debug, Deserialize)]
struct OutlineItem {
    #[serde(default)]
    heading: String,
    #[serde(default, alias = "plannedChars")]
    planned_chars: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSection {
    pub heading: String,
    pub planned_chars: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub title: Option<String>,
    pub sections: Vec<PlannedSection>,
}

/// Turns the provider's outline into planned sections.
///
/// Blank headings are dropped and the list is cut to `max_sections`. An outline
/// shorter than `min_sections` is accepted with a warning; an empty one fails the
/// step. Missing lengths share `target_chars` evenly.
pub fn parse_outline(
    output: GenerationOutput,
    requirements: &StructuralRequirements,
) -> Result<Outline, PipelineError> {
    let response: OutlineResponse = output.parse()?;

    let mut items: Vec<OutlineItem> = response
        .sections
        .into_iter()
        .filter(|item| !item.heading.trim().is_empty())
        .collect();

    if items.is_empty() {
        return Err(PipelineError::InvalidOutline(
            "outline contains no sections".to_string(),
        ));
    }

    let max = requirements.max_sections.max(1) as usize;
    if items.len() > max {
        warn!(
            proposed = items.len(),
            max_sections = max,
            "Outline longer than allowed, truncating"
        );
        items.truncate(max);
    }
    if (items.len() as u32) < requirements.min_sections {
        warn!(
            proposed = items.len(),
            min_sections = requirements.min_sections,
            "Outline shorter than requested"
        );
    }

    let even_share = (requirements.target_chars / items.len() as u32).max(MIN_PLANNED_CHARS);
    let ceiling = requirements.target_chars.max(MIN_PLANNED_CHARS);
    let sections = items
        .into_iter()
        .map(|item| PlannedSection {
            heading: item.heading.trim().to_string(),
            planned_chars: item
                .planned_chars
                .filter(|c| *c > 0)
                .map(|c| c.clamp(MIN_PLANNED_CHARS, ceiling))
                .unwrap_or(even_share),
        })
        .collect();

    let title = response
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(Outline { title, sections })
}
