//! Extra steps of the comparison topology: competitor research and the table.

use tracing::{debug, info};

use crate::model::Document;
use crate::provider::{GenerationProvider, ProviderError, RetryPolicy};

use super::error::PipelineError;
use super::prompts;

fn competitors(doc: &Document) -> Result<Vec<&str>, PipelineError> {
    let names: Vec<&str> = doc
        .options
        .comparison
        .as_ref()
        .map(|c| {
            c.competitors
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if names.is_empty() {
        return Err(PipelineError::Precondition(
            "comparison document has no competitors configured".to_string(),
        ));
    }
    Ok(names)
}

/// One summary per competitor, in the configured order, as Markdown.
/// Any competitor failing after retries fails the whole step.
pub async fn research(
    provider: &dyn GenerationProvider,
    retry: &RetryPolicy,
    doc: &Document,
) -> Result<String, PipelineError> {
    let mut notes = Vec::new();
    for name in competitors(doc)? {
        let request = prompts::research_request(doc, name);
        let text = retry
            .run("research", || provider.generate(&request))
            .await?
            .into_text();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidOutput(format!(
                "empty research notes for {}",
                name
            ))
            .into());
        }
        debug!(competitor = name, chars = text.len(), "Research notes received");
        notes.push(format!("### {}\n{}", name, text));
    }
    info!(competitors = notes.len(), "Research complete");
    Ok(notes.join("\n\n"))
}

/// Markdown comparison table over the competitors and criteria.
pub async fn comparison_table(
    provider: &dyn GenerationProvider,
    retry: &RetryPolicy,
    doc: &Document,
) -> Result<String, PipelineError> {
    competitors(doc)?;
    let request = prompts::table_request(doc);
    let table = retry
        .run("table", || provider.generate(&request))
        .await?
        .into_text();
    let table = table.trim();
    if !table.contains('|') {
        return Err(ProviderError::InvalidOutput("table output is not a Markdown table".to_string()).into());
    }
    Ok(table.to_string())
}
