//! The job state machine.
//!
//! [`Orchestrator::advance`] performs at most one unit of work per call and
//! persists the result before returning. Callers poll it until the job is
//! terminal; a call on a terminal job returns immediately.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::db::{document_repo, job_repo, section_repo, Database};
use crate::error::{LongformError, Result};
use crate::media::{MediaError, MediaOrchestrator};
use crate::model::{Document, Job, JobSnapshot, JobStatus, Section, SectionStatus, Step, Topology};
use crate::provider::{GenerationProvider, RetryPolicy};

use super::comparison;
use super::config::PipelineSettings;
use super::error::PipelineError;
use super::integrator;
use super::locks::KeyedLocks;
use super::outline::parse_outline;
use super::prompts;
use super::section::SectionPipeline;
use super::topology::StepPlan;

pub struct Orchestrator {
    db: Database,
    provider: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
    settings: PipelineSettings,
    job_locks: KeyedLocks,
    section_locks: KeyedLocks,
    media: Option<Arc<MediaOrchestrator>>,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        provider: Arc<dyn GenerationProvider>,
        retry: RetryPolicy,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            provider,
            retry,
            settings,
            job_locks: KeyedLocks::new(),
            section_locks: KeyedLocks::new(),
            media: None,
        }
    }

    /// Media orchestrator run by the optional media step.
    pub fn with_media(mut self, media: Arc<MediaOrchestrator>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Current state of a job and its sections. Never generates anything.
    pub fn snapshot(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = self.load_job(job_id)?;
        self.snapshot_of(&job)
    }

    /// Performs at most one unit of work for the job and returns the resulting snapshot.
    ///
    /// Step failures end up in the snapshot (`status = error`); `Err` is reserved for
    /// infrastructure problems and unknown job ids.
    pub async fn advance(&self, job_id: &str) -> Result<JobSnapshot> {
        let span = info_span!("advance", job_id = %job_id, step = tracing::field::Empty);
        self.advance_locked(job_id).instrument(span).await
    }

    async fn advance_locked(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = self.load_job(job_id)?;
        if job.status.is_terminal() {
            return self.snapshot_of(&job);
        }

        let seen = job.position();
        let Some(_guard) = self
            .job_locks
            .acquire_timeout(job_id, self.settings.lock_wait)
            .await
        else {
            debug!("Job is busy, returning current snapshot");
            return self.snapshot(job_id);
        };

        let mut job = self.load_job(job_id)?;
        if job.position() != seen {
            debug!("Job moved on while waiting, nothing to do");
            return self.snapshot_of(&job);
        }
        Span::current().record("step", job.step.as_str());

        match (job.status, job.step) {
            (JobStatus::Queued, Step::Init) | (JobStatus::Running, Step::Init) => {
                self.start(&mut job)?
            }
            (JobStatus::Queued, _) => self.resume(&mut job)?,
            (JobStatus::Running, _) => self.run_step(&mut job).await?,
            (JobStatus::Done, _) | (JobStatus::Error, _) => {}
        }

        self.snapshot_of(&job)
    }

    /// Moves a failed job back to `queued`. Step and cursor are kept, so the next
    /// advance resumes where it failed. No-op for any other status.
    pub async fn retry_job(&self, job_id: &str) -> Result<JobSnapshot> {
        let Some(_guard) = self
            .job_locks
            .acquire_timeout(job_id, self.settings.lock_wait)
            .await
        else {
            return self.snapshot(job_id);
        };

        let mut job = self.load_job(job_id)?;
        if job.status != JobStatus::Error {
            debug!(job_id, status = job.status.as_str(), "Retry ignored");
            return self.snapshot_of(&job);
        }

        job.status = JobStatus::Queued;
        job.error = None;
        job.finished_at = None;
        job.updated_at = Utc::now();
        job_repo::update(&self.db, &job)?;
        info!(job_id, step = job.step.as_str(), cursor = job.cursor, "Job requeued");

        self.snapshot_of(&job)
    }

    /// Rewrites one section from scratch, independent of its job.
    ///
    /// Serialized with any advance that writes or integrates the same section.
    /// The job's status, cursor and timestamps are untouched. A regeneration failure
    /// is recorded on the section, which is returned either way. When the document
    /// is already integrated its body is rebuilt from the current sections.
    pub async fn regenerate_section(&self, section_id: &str) -> Result<Section> {
        let span = info_span!("regenerate", section_id = %section_id);
        self.regenerate_locked(section_id).instrument(span).await
    }

    async fn regenerate_locked(&self, section_id: &str) -> Result<Section> {
        if section_repo::find_by_id(&self.db, section_id)?.is_none() {
            return Err(LongformError::SectionNotFound(section_id.to_string()));
        }

        let _guard = self.section_locks.acquire(section_id).await;

        // the integrate step may have finished while we waited
        let mut section = section_repo::find_by_id(&self.db, section_id)?
            .ok_or_else(|| LongformError::SectionNotFound(section_id.to_string()))?;
        let doc = document_repo::find_by_id(&self.db, &section.document_id)?
            .ok_or_else(|| LongformError::DocumentNotFound(section.document_id.clone()))?;
        section.status = SectionStatus::Pending;
        section.content = None;
        section.consistency = None;
        section.error = None;
        section.updated_at = Utc::now();
        section_repo::update(&self.db, &section)?;

        let siblings = section_repo::list_for_document(&self.db, &doc.id)?;
        match self.section_pipeline().run(&doc, &mut section, &siblings).await {
            Ok(outcome) => {
                info!(rewrites = outcome.rewrites, "Section regenerated");
                if doc.is_complete() {
                    self.rebuild_body(&doc)?;
                }
            }
            Err(PipelineError::Database(e)) => return Err(e.into()),
            Err(e) => warn!(error = %e, "Regeneration failed"),
        }

        Ok(section)
    }

    fn rebuild_body(&self, doc: &Document) -> Result<()> {
        let sections = section_repo::list_for_document(&self.db, &doc.id)?;
        match self.render_body(doc, &sections) {
            Ok(body) => {
                self.db
                    .with_conn(|conn| document_repo::set_body_in(conn, &doc.id, &body))?;
                debug!("Document body rebuilt");
            }
            Err(e) => debug!(error = %e, "Body left unchanged"),
        }
        Ok(())
    }

    fn render_body(
        &self,
        doc: &Document,
        sections: &[Section],
    ) -> std::result::Result<String, PipelineError> {
        let mut body = integrator::integrate(doc.display_title(), sections)?;
        if doc.topology == Topology::Comparison {
            if let Some(table) = &doc.comparison_table {
                integrator::append_table(&mut body, table);
            }
        }
        Ok(body)
    }

    fn section_pipeline(&self) -> SectionPipeline<'_> {
        SectionPipeline {
            db: &self.db,
            provider: self.provider.as_ref(),
            retry: &self.retry,
            consistency: &self.settings.consistency,
            digest: &self.settings.digest,
        }
    }

    fn plan(&self, job: &Job) -> StepPlan {
        StepPlan::new(job.topology, self.settings.run_media_step)
    }

    fn load_job(&self, job_id: &str) -> Result<Job> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| LongformError::JobNotFound(job_id.to_string()))
    }

    fn snapshot_of(&self, job: &Job) -> Result<JobSnapshot> {
        let sections = section_repo::list_for_document(&self.db, &job.document_id)?;
        Ok(JobSnapshot::new(job, &sections))
    }

    fn document(&self, id: &str) -> std::result::Result<Document, PipelineError> {
        document_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| PipelineError::Precondition(format!("Document '{}' no longer exists", id)))
    }

    /// `init`: checks the document and moves to the first work step.
    fn start(&self, job: &mut Job) -> Result<()> {
        match document_repo::find_by_id(&self.db, &job.document_id)? {
            None => {
                error!("Document missing at job start");
                job.fail(format!("Document '{}' no longer exists", job.document_id));
            }
            Some(doc) if doc.is_complete() => {
                warn!("Document already generated");
                job.fail("Document has already been generated");
            }
            Some(_) => {
                let now = Utc::now();
                job.status = JobStatus::Running;
                job.step = self.plan(job).next_after(Step::Init);
                job.error = None;
                job.started_at = Some(now);
                job.updated_at = now;
                info!(topology = job.topology.as_str(), "Job started");
            }
        }
        job_repo::update(&self.db, job)?;
        Ok(())
    }

    /// A requeued job only flips back to running; the next call does the work.
    fn resume(&self, job: &mut Job) -> Result<()> {
        job.status = JobStatus::Running;
        job.error = None;
        job.finished_at = None;
        job.updated_at = Utc::now();
        job_repo::update(&self.db, job)?;
        info!(step = job.step.as_str(), cursor = job.cursor, "Job resumed");
        Ok(())
    }

    async fn run_step(&self, job: &mut Job) -> Result<()> {
        let plan = self.plan(job);
        let step = job.step;
        let cursor = job.cursor;
        let result = match step {
            Step::Init => return self.start(job),
            Step::Outline => {
                self.step_outline(job, &plan)
                    .instrument(info_span!("outline"))
                    .await
            }
            Step::Research => {
                self.step_research(job, &plan)
                    .instrument(info_span!("research"))
                    .await
            }
            Step::Sections => {
                self.step_sections(job, &plan)
                    .instrument(info_span!("sections", cursor))
                    .await
            }
            Step::Table => {
                self.step_table(job, &plan)
                    .instrument(info_span!("table"))
                    .await
            }
            Step::Integrate => {
                self.step_integrate(job, &plan)
                    .instrument(info_span!("integrate"))
                    .await
            }
            Step::Media => self.step_media(job).instrument(info_span!("media")).await,
            Step::Done => {
                job.finish();
                job_repo::update(&self.db, job).map_err(PipelineError::from)
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(PipelineError::Database(e)) => Err(e.into()),
            Err(e) => self.fail(job, step, e),
        }
    }

    fn fail(&self, job: &mut Job, step: Step, cause: PipelineError) -> Result<()> {
        let message = cause.to_string();
        match cause {
            PipelineError::Integration(_) | PipelineError::Precondition(_) => {
                error!(step = step.as_str(), error = %message, "Pipeline invoked out of order")
            }
            _ => error!(step = step.as_str(), error = %message, "Step failed"),
        }
        job.fail(message);
        job_repo::update(&self.db, job)?;
        Ok(())
    }

    async fn step_outline(
        &self,
        job: &mut Job,
        plan: &StepPlan,
    ) -> std::result::Result<(), PipelineError> {
        let doc = self.document(&job.document_id)?;
        let request = prompts::outline_request(&doc);
        let output = self
            .retry
            .run("outline", || self.provider.generate(&request))
            .await?;
        let outline = parse_outline(output, &doc.requirements)?;

        let sections: Vec<Section> = (0u32..)
            .zip(outline.sections.iter())
            .map(|(index, planned)| {
                Section::planned(&doc.id, &job.id, index, &planned.heading, planned.planned_chars)
            })
            .collect();
        let total = sections.len() as u32;

        job.step = plan.next_after(Step::Outline);
        job.cursor = 0;
        job.raise_progress(plan.progress_at(job.step, 0, total));
        job.updated_at = Utc::now();

        let title = outline.title.as_deref();
        self.db.with_tx(|conn| {
            let stale = section_repo::delete_for_document_in(conn, &doc.id)?;
            if stale > 0 {
                warn!(stale, "Replacing sections left by an earlier outline attempt");
            }
            section_repo::insert_all_in(conn, &sections)?;
            document_repo::set_title_in(conn, &doc.id, title)?;
            job_repo::update_in(conn, job)
        })?;

        info!(sections = total, "Outline persisted");
        Ok(())
    }

    async fn step_research(
        &self,
        job: &mut Job,
        plan: &StepPlan,
    ) -> std::result::Result<(), PipelineError> {
        let doc = self.document(&job.document_id)?;
        let notes = comparison::research(self.provider.as_ref(), &self.retry, &doc).await?;
        document_repo::set_research_notes(&self.db, &doc.id, &notes)?;

        job.step = plan.next_after(Step::Research);
        job.raise_progress(plan.progress_at(job.step, 0, 0));
        job.updated_at = Utc::now();
        job_repo::update(&self.db, job)?;
        Ok(())
    }

    async fn step_sections(
        &self,
        job: &mut Job,
        plan: &StepPlan,
    ) -> std::result::Result<(), PipelineError> {
        let doc = self.document(&job.document_id)?;
        let planned = section_repo::list_for_document(&self.db, &doc.id)?;
        let total = planned.len() as u32;
        if total == 0 {
            return Err(PipelineError::Precondition(
                "No sections planned for document".to_string(),
            ));
        }

        if job.cursor < total {
            let index = job.cursor;
            let section_id = planned
                .iter()
                .find(|s| s.index == index)
                .map(|s| s.id.clone())
                .ok_or_else(|| {
                    PipelineError::Precondition(format!("No section at index {}", index))
                })?;

            let _guard = self.section_locks.acquire(&section_id).await;

            // re-read under the lock; a regeneration may have finished this section
            let siblings = section_repo::list_for_document(&self.db, &doc.id)?;
            let mut section = siblings
                .iter()
                .find(|s| s.id == section_id)
                .cloned()
                .ok_or_else(|| {
                    PipelineError::Precondition(format!("Section {} disappeared", index))
                })?;

            if section.is_reviewed() {
                debug!(index, "Section already reviewed, moving on");
            } else {
                section.job_id = Some(job.id.clone());
                self.section_pipeline()
                    .run(&doc, &mut section, &siblings)
                    .await?;
            }
            job.cursor = index + 1;
        }

        if job.cursor >= total {
            job.step = plan.next_after(Step::Sections);
        }
        job.raise_progress(plan.progress_at(job.step, job.cursor, total));
        job.updated_at = Utc::now();
        job_repo::update(&self.db, job)?;
        Ok(())
    }

    async fn step_table(
        &self,
        job: &mut Job,
        plan: &StepPlan,
    ) -> std::result::Result<(), PipelineError> {
        let doc = self.document(&job.document_id)?;
        let table = comparison::comparison_table(self.provider.as_ref(), &self.retry, &doc).await?;
        document_repo::set_comparison_table(&self.db, &doc.id, &table)?;

        let total = section_repo::list_for_document(&self.db, &doc.id)?.len() as u32;
        job.step = plan.next_after(Step::Table);
        job.raise_progress(plan.progress_at(job.step, total, total));
        job.updated_at = Utc::now();
        job_repo::update(&self.db, job)?;
        Ok(())
    }

    async fn step_integrate(
        &self,
        job: &mut Job,
        plan: &StepPlan,
    ) -> std::result::Result<(), PipelineError> {
        let doc = self.document(&job.document_id)?;

        // Every section lock is held, in index order, until the body is stored.
        let planned = section_repo::list_for_document(&self.db, &doc.id)?;
        let mut guards = Vec::with_capacity(planned.len());
        for section in &planned {
            guards.push(self.section_locks.acquire(&section.id).await);
        }

        let sections = section_repo::list_for_document(&self.db, &doc.id)?;
        let body = self.render_body(&doc, &sections)?;
        let total = sections.len() as u32;

        let next = plan.next_after(Step::Integrate);
        if next == Step::Done {
            job.finish();
        } else {
            job.step = next;
            job.raise_progress(plan.progress_at(next, total, total));
            job.updated_at = Utc::now();
        }

        self.db.with_tx(|conn| {
            document_repo::set_body_in(conn, &doc.id, &body)?;
            section_repo::clear_job_in(conn, &doc.id)?;
            job_repo::update_in(conn, job)
        })?;
        drop(guards);

        info!(chars = body.chars().count(), next = next.as_str(), "Document integrated");
        Ok(())
    }

    /// Tops up media. Asset failures never fail the job.
    async fn step_media(&self, job: &mut Job) -> std::result::Result<(), PipelineError> {
        match &self.media {
            Some(media) => match media.ensure_assets(&job.document_id).await {
                Ok(assets) => info!(assets = assets.len(), "Media step complete"),
                Err(MediaError::Database(e)) => return Err(e.into()),
                Err(e) => warn!(error = %e, "Media step skipped"),
            },
            None => warn!("Media step enabled without a media orchestrator, skipping"),
        }

        job.finish();
        job_repo::update(&self.db, job)?;
        Ok(())
    }
}
