//! Assembles reviewed sections into the document body.

use crate::model::{Section, SectionStatus};

use super::error::IntegrationError;

/// Concatenates sections `0..N` in index order under a title heading.
///
/// Pure and deterministic. Every index must be present, reviewed and non-empty;
/// nothing is skipped.
pub fn integrate(title: &str, sections: &[Section]) -> Result<String, IntegrationError> {
    if sections.is_empty() {
        return Err(IntegrationError::NoSections);
    }

    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut body = format!("# {}\n", title.trim());
    for (expected, section) in (0u32..).zip(ordered.iter()) {
        if section.index != expected {
            return Err(IntegrationError::MissingSection { index: expected });
        }
        if section.status != SectionStatus::Reviewed {
            return Err(IntegrationError::not_reviewed(section.index, section.status));
        }
        let content = section
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(IntegrationError::EmptySection {
                index: section.index,
            })?;

        body.push_str(&format!("\n## {}\n\n{}\n", section.heading(), content));
    }

    Ok(body)
}

/// Appends the comparison table after the sections.
pub fn append_table(body: &mut String, table: &str) {
    let table = table.trim();
    if !table.is_empty() {
        body.push_str(&format!("\n## Comparison\n\n{}\n", table));
    }
}
