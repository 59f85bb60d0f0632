//! Section writer and consistency checker.
//!
//! A section moves `generating → written → reviewed`. Written content is persisted
//! before the checker runs, so a checker failure never loses it. Any failure marks
//! the section `failed` with the causing message.

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{ConsistencyConfig, DigestConfig};
use crate::db::{section_repo, Database};
use crate::model::{ConsistencyReport, Document, Section, SectionStatus, Severity};
use crate::provider::{GenerationProvider, ProviderError, RetryPolicy};

use super::digest::{build_digest, Digest};
use super::error::PipelineError;
use super::prompts;

/// Result of one successful section run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOutcome {
    pub rewrites: u32,
    pub severity: Severity,
}

pub struct SectionPipeline<'a> {
    pub db: &'a Database,
    pub provider: &'a dyn GenerationProvider,
    pub retry: &'a RetryPolicy,
    pub consistency: &'a ConsistencyConfig,
    pub digest: &'a DigestConfig,
}

impl SectionPipeline<'_> {
    /// Writes and reviews `section`. `siblings` are the document's sections as
    /// currently stored; only reviewed ones before `section.index` feed the digest.
    ///
    /// The caller holds the section's lock.
    pub async fn run(
        &self,
        doc: &Document,
        section: &mut Section,
        siblings: &[Section],
    ) -> Result<SectionOutcome, PipelineError> {
        let span = info_span!("section", index = section.index, section_id = %section.id);
        self.write_and_review(doc, section, siblings)
            .instrument(span)
            .await
    }

    async fn write_and_review(
        &self,
        doc: &Document,
        section: &mut Section,
        siblings: &[Section],
    ) -> Result<SectionOutcome, PipelineError> {
        let digest = build_digest(siblings, section.index, self.digest);

        section.status = SectionStatus::Generating;
        section.error = None;
        self.save(section)?;

        let content = match self.write(doc, section, &digest, None).await {
            Ok(content) => content,
            Err(e) => return Err(self.mark_failed(section, e)?),
        };
        section.content = Some(content);
        section.status = SectionStatus::Written;
        self.save(section)?;

        let mut rounds: Vec<ConsistencyReport> = Vec::new();
        let mut rewrites = 0;
        loop {
            let text = section.content.as_deref().unwrap_or_default();
            let report = match self.check(section, text, &digest).await {
                Ok(report) => report,
                Err(e) => return Err(self.mark_failed(section, e)?),
            };
            let needs_rewrite = self.needs_rewrite(&report);
            rounds.push(report);

            if !needs_rewrite || rewrites >= self.consistency.max_automatic_rewrites {
                break;
            }

            rewrites += 1;
            warn!(
                rewrite = rewrites,
                severity = rounds.last().map(|r| r.severity.as_str()).unwrap_or("none"),
                "Consistency findings above threshold, rewriting section"
            );
            let content = match self.write(doc, section, &digest, rounds.last()).await {
                Ok(content) => content,
                Err(e) => return Err(self.mark_failed(section, e)?),
            };
            section.content = Some(content);
            section.status = SectionStatus::Written;
            self.save(section)?;
        }

        let severity = rounds.last().map(|r| r.severity).unwrap_or_default();
        section.consistency = Some(render_rounds(&rounds));
        section.status = SectionStatus::Reviewed;
        section.error = None;
        self.save(section)?;

        info!(rewrites, severity = severity.as_str(), "Section reviewed");
        Ok(SectionOutcome { rewrites, severity })
    }

    async fn write(
        &self,
        doc: &Document,
        section: &Section,
        digest: &Digest,
        findings: Option<&ConsistencyReport>,
    ) -> Result<String, ProviderError> {
        let request = prompts::section_request(doc, section, digest, findings);
        let text = self
            .retry
            .run("section", || self.provider.generate(&request))
            .await?
            .into_text();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidOutput(
                "writer returned empty content".to_string(),
            ));
        }
        Ok(text.to_string())
    }

    async fn check(
        &self,
        section: &Section,
        content: &str,
        digest: &Digest,
    ) -> Result<ConsistencyReport, ProviderError> {
        let request = prompts::consistency_request(section, content, digest);
        self.retry
            .run("consistency", || self.provider.generate(&request))
            .await?
            .parse()
    }

    fn needs_rewrite(&self, report: &ConsistencyReport) -> bool {
        !report.is_clean() && report.severity >= self.consistency.rewrite_threshold
    }

    fn save(&self, section: &mut Section) -> Result<(), PipelineError> {
        section.updated_at = Utc::now();
        section_repo::update(self.db, section)?;
        Ok(())
    }

    /// Records the failure on the section and returns the step error to surface.
    /// Content from an earlier successful write is kept.
    fn mark_failed(
        &self,
        section: &mut Section,
        cause: ProviderError,
    ) -> Result<PipelineError, PipelineError> {
        let message = cause.to_string();
        warn!(error = %message, "Section failed");
        section.status = SectionStatus::Failed;
        section.error = Some(message.clone());
        self.save(section)?;
        Ok(PipelineError::Section {
            index: section.index,
            message,
        })
    }
}

/// Every round's notes, numbered when there was more than one.
fn render_rounds(rounds: &[ConsistencyReport]) -> String {
    if rounds.len() == 1 {
        return rounds[0].to_notes();
    }
    rounds
        .iter()
        .enumerate()
        .map(|(i, r)| format!("round {}:\n{}", i + 1, r.to_notes()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
