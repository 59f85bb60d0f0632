//! Request builders for every generation call the pipeline makes.

use std::fmt::Write as _;

use crate::model::{ConsistencyReport, Document, Section};
use crate::provider::{GenerationRequest, Purpose};

use super::digest::Digest;

const WRITER_SYSTEM: &str = "You are a careful long-form writer. Write in plain Markdown \
without a top-level heading. Stay on the section's subject and do not repeat material \
from earlier sections.";

const OUTLINE_SYSTEM: &str = "You plan long-form articles. Produce a title and an ordered \
list of section headings that together cover the topic without overlap.";

const CHECKER_SYSTEM: &str = "You review a newly written section against the sections \
before it. Report contradictions and duplicated material. Minor stylistic issues are \
severity \"minor\"; factual or logical conflicts are \"contradiction\".";

const RESEARCH_SYSTEM: &str = "You are a product analyst. Summarize what is publicly known \
about one product: positioning, strengths, weaknesses and pricing model. Be factual and brief.";

const TABLE_SYSTEM: &str = "You build Markdown comparison tables. Output only the table.";

pub const OUTLINE_SCHEMA: &str =
    r#"{"title": "string", "sections": [{"heading": "string", "planned_chars": "integer, optional"}]}"#;

pub const CONSISTENCY_SCHEMA: &str = r#"{"severity": "none | minor | contradiction", "findings": [{"kind": "contradiction | duplication | other", "detail": "string"}]}"#;

fn push_requirements(prompt: &mut String, doc: &Document) {
    let req = &doc.requirements;
    if let Some(tone) = &req.tone {
        let _ = writeln!(prompt, "Tone: {}", tone);
    }
    if let Some(audience) = &req.audience {
        let _ = writeln!(prompt, "Audience: {}", audience);
    }
    if !req.keywords.is_empty() {
        let _ = writeln!(prompt, "Keywords to work in: {}", req.keywords.join(", "));
    }
}

pub fn outline_request(doc: &Document) -> GenerationRequest {
    let req = &doc.requirements;
    let mut prompt = format!(
        "Topic: {}\nTotal length: about {} characters\nSections: between {} and {}\n",
        doc.topic, req.target_chars, req.min_sections, req.max_sections
    );
    if !req.heading_hints.is_empty() {
        let _ = writeln!(
            prompt,
            "Include these headings, in this order: {}",
            req.heading_hints.join("; ")
        );
    }
    push_requirements(&mut prompt, doc);
    if let Some(comparison) = &doc.options.comparison {
        let _ = writeln!(
            prompt,
            "This is a comparison of: {}",
            comparison.competitors.join(", ")
        );
    }
    if let Some(llmo) = &doc.options.llmo {
        if !llmo.target_queries.is_empty() {
            let _ = writeln!(
                prompt,
                "Readers arrive with these questions: {}",
                llmo.target_queries.join("; ")
            );
        }
    }

    GenerationRequest::json(
        Purpose::Outline,
        doc.topic.as_str(),
        OUTLINE_SYSTEM,
        prompt,
        OUTLINE_SCHEMA,
    )
}

pub fn research_request(doc: &Document, competitor: &str) -> GenerationRequest {
    let mut prompt = format!("Product: {}\nContext: an article about {}\n", competitor, doc.topic);
    if let Some(comparison) = &doc.options.comparison {
        if !comparison.criteria.is_empty() {
            let _ = writeln!(prompt, "Cover these criteria: {}", comparison.criteria.join(", "));
        }
    }
    GenerationRequest::text(Purpose::Research, competitor, RESEARCH_SYSTEM, prompt)
}

/// Writer request. `findings` is set when this is an automatic rewrite.
pub fn section_request(
    doc: &Document,
    section: &Section,
    digest: &Digest,
    findings: Option<&ConsistencyReport>,
) -> GenerationRequest {
    let heading = section.heading();
    let mut prompt = format!(
        "Article: {}\nSection {}: {}\nLength: about {} characters\n",
        doc.display_title(),
        section.index + 1,
        heading,
        section.planned_chars
    );
    push_requirements(&mut prompt, doc);

    if let Some(llmo) = &doc.options.llmo {
        if llmo.summary_box {
            prompt.push_str("Open with a one-sentence takeaway in bold.\n");
        }
        if llmo.faq {
            prompt.push_str("Close with one short question-and-answer pair.\n");
        }
    }
    if let Some(notes) = &doc.research_notes {
        let _ = write!(prompt, "\nResearch notes:\n{}\n", notes);
    }
    if !digest.is_empty() {
        let _ = write!(prompt, "\n{}\n", digest.render());
    }
    if let Some(report) = findings {
        let _ = write!(
            prompt,
            "\nA previous draft of this section had these problems. Avoid them:\n{}\n",
            report.to_notes()
        );
    }

    GenerationRequest::text(Purpose::Section, heading, WRITER_SYSTEM, prompt)
}

pub fn consistency_request(
    section: &Section,
    content: &str,
    digest: &Digest,
) -> GenerationRequest {
    let heading = section.heading();
    let mut prompt = String::new();
    if digest.is_empty() {
        prompt.push_str("There are no earlier sections.\n");
    } else {
        let _ = writeln!(prompt, "{}", digest.render());
    }
    let _ = write!(prompt, "\nNew section \"{}\":\n{}\n", heading, content);

    GenerationRequest::json(
        Purpose::Consistency,
        heading,
        CHECKER_SYSTEM,
        prompt,
        CONSISTENCY_SCHEMA,
    )
}

pub fn table_request(doc: &Document) -> GenerationRequest {
    let (competitors, criteria) = doc
        .options
        .comparison
        .as_ref()
        .map(|c| (c.competitors.join(", "), c.criteria.join(", ")))
        .unwrap_or_default();
    let mut prompt = format!("Compare: {}\n", competitors);
    if !criteria.is_empty() {
        let _ = writeln!(prompt, "Columns: {}", criteria);
    }
    if let Some(notes) = &doc.research_notes {
        let _ = write!(prompt, "\nNotes:\n{}\n", notes);
    }
    GenerationRequest::text(Purpose::Table, doc.display_title(), TABLE_SYSTEM, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DocumentOptions, LlmoOptions, Severity, StructuralRequirements, Topology,
    };
    use crate::provider::ResponseShape;

    fn document() -> Document {
        let mut doc = Document::new(
            "alice",
            "Sourdough",
            StructuralRequirements {
                heading_hints: vec!["Starter".to_string()],
                tone: Some("friendly".to_string()),
                ..Default::default()
            },
            Topology::Standard,
            DocumentOptions {
                llmo: Some(LlmoOptions {
                    faq: true,
                    ..Default::default()
                }),
                comparison: None,
            },
        );
        doc.title = Some("Baking sourdough".to_string());
        doc
    }

    #[test]
    fn test_outline_request_is_json() {
        let request = outline_request(&document());
        assert_eq!(request.purpose, Purpose::Outline);
        assert!(matches!(request.shape, ResponseShape::Json { .. }));
        assert!(request.prompt.contains("Starter"));
        assert!(request.prompt.contains("Tone: friendly"));
    }

    #[test]
    fn test_section_request_carries_digest_and_findings() {
        let doc = document();
        let section = Section::planned(&doc.id, "job", 1, "Feeding", 900);
        let digest = Digest {
            headings: vec!["Starter".to_string(), "Feeding".to_string()],
            entries: vec![],
        };
        let report = ConsistencyReport {
            severity: Severity::Contradiction,
            findings: vec![],
        };

        let request = section_request(&doc, &section, &digest, Some(&report));
        assert_eq!(request.label, "Feeding");
        assert!(request.prompt.contains("Section 2: Feeding"));
        assert!(request.prompt.contains("about 900 characters"));
        assert!(request.prompt.contains("question-and-answer"));
        assert!(request.prompt.contains("previous draft"));
        assert!(request.prompt.contains("1. Starter"));
    }
}
