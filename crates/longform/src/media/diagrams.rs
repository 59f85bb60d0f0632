//! Diagram proposals and the fallbacks that guarantee forward progress.

use std::collections::HashSet;

use serde::Deserialize;

use crate::model::Document;
use crate::provider::{GenerationOutput, GenerationRequest, ProviderError, Purpose};

/// Body characters shown to the model when asking for proposals.
const BODY_EXCERPT_CHARS: usize = 6000;

const PROPOSAL_SYSTEM: &str = "You suggest explanatory diagrams for an article. Each diagram \
must illustrate something the article actually discusses.";

const PROPOSAL_SCHEMA: &str = r#"{"diagrams": [{"title": "string", "description": "string"}]}"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiagramProposal {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ProposalResponse {
    #[serde(default)]
    diagrams: Vec<DiagramProposal>,
}

pub fn proposals_request(
    doc: &Document,
    needed: usize,
    existing_titles: &[String],
) -> GenerationRequest {
    let body = doc.body.as_deref().unwrap_or_default();
    let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    let mut prompt = format!(
        "Propose up to {} diagrams for this article.\n\n{}\n",
        needed, excerpt
    );
    if !existing_titles.is_empty() {
        prompt.push_str(&format!(
            "\nThese diagrams already exist, do not repeat them: {}\n",
            existing_titles.join("; ")
        ));
    }
    GenerationRequest::json(
        Purpose::DiagramProposals,
        doc.display_title(),
        PROPOSAL_SYSTEM,
        prompt,
        PROPOSAL_SCHEMA,
    )
}

pub fn parse_proposals(output: GenerationOutput) -> Result<Vec<DiagramProposal>, ProviderError> {
    Ok(output.parse::<ProposalResponse>()?.diagrams)
}

fn key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Chooses exactly `needed` diagrams, none repeating an existing title.
///
/// Model proposals come first, then section headings, then numbered overview
/// diagrams, so a degraded proposal step still makes progress.
pub fn plan_diagrams(
    proposed: Vec<DiagramProposal>,
    existing_titles: &[String],
    headings: &[String],
    needed: usize,
) -> Vec<DiagramProposal> {
    let mut seen: HashSet<String> = existing_titles.iter().map(|t| key(t)).collect();
    let mut planned = Vec::with_capacity(needed);

    let mut accept = |candidate: DiagramProposal, planned: &mut Vec<DiagramProposal>| {
        let title = candidate.title.trim();
        if planned.len() >= needed || title.is_empty() || !seen.insert(key(title)) {
            return;
        }
        planned.push(DiagramProposal {
            title: title.to_string(),
            description: candidate.description.trim().to_string(),
        });
    };

    for proposal in proposed {
        accept(proposal, &mut planned);
    }
    for heading in headings {
        accept(
            DiagramProposal {
                title: heading.clone(),
                description: format!("How the ideas in \"{}\" fit together", heading.trim()),
            },
            &mut planned,
        );
    }
    let mut n = 1;
    while planned.len() < needed {
        accept(
            DiagramProposal {
                title: format!("Overview diagram {}", n),
                description: "A high-level overview of the article's main ideas".to_string(),
            },
            &mut planned,
        );
        n += 1;
    }

    planned
}

pub fn diagram_prompt(title: &str, proposal: &DiagramProposal) -> String {
    let mut prompt = format!(
        "A clean explanatory diagram titled \"{}\" for an article about {}.",
        proposal.title, title
    );
    if !proposal.description.is_empty() {
        prompt.push_str(&format!(" It shows: {}.", proposal.description.trim_end_matches('.')));
    }
    prompt.push_str(" Flat style, labelled boxes and arrows, white background.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn proposal(title: &str) -> DiagramProposal {
        DiagramProposal {
            title: title.to_string(),
            description: format!("about {}", title),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_proposals_deduplicated_against_existing() {
        let planned = plan_diagrams(
            vec![proposal("Data flow"), proposal(" data FLOW "), proposal("Architecture")],
            &strings(&["Architecture"]),
            &[],
            2,
        );
        let titles: Vec<&str> = planned.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Data flow", "Overview diagram 1"]);
    }

    #[test]
    fn test_falls_back_to_headings_then_numbers() {
        let planned = plan_diagrams(
            vec![],
            &strings(&["Setup"]),
            &strings(&["Setup", "Usage"]),
            3,
        );
        let titles: Vec<&str> = planned.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Usage", "Overview diagram 1", "Overview diagram 2"]);
    }

    #[test]
    fn test_numbered_fallback_skips_taken_titles() {
        let planned = plan_diagrams(vec![], &strings(&["Overview diagram 1"]), &[], 1);
        assert_eq!(planned[0].title, "Overview diagram 2");
    }

    #[test]
    fn test_never_more_than_needed() {
        let many: Vec<DiagramProposal> = (0..20).map(|i| proposal(&format!("D{}", i))).collect();
        assert_eq!(plan_diagrams(many, &[], &[], 4).len(), 4);
        assert!(plan_diagrams(vec![proposal("A")], &[], &[], 0).is_empty());
    }

    #[test]
    fn test_parse_proposals() {
        let output = GenerationOutput::Structured(json!({
            "diagrams": [{"title": "Flow"}, {"title": "Stack", "description": "layers"}]
        }));
        let proposals = parse_proposals(output).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].description, "");

        let err = parse_proposals(GenerationOutput::Text("no".into())).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidOutput(_)));
    }

    #[test]
    fn test_diagram_prompt() {
        let prompt = diagram_prompt("Tides", &proposal("Moon pull"));
        assert!(prompt.contains("\"Moon pull\""));
        assert!(prompt.contains("It shows: about Moon pull."));
    }
}
