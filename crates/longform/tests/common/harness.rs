//! Test harness for isolated pipeline runs.
//!
//! Each `TestHarness` owns a temporary asset directory, an in-memory database and a
//! `ScriptedProvider`, and wires them into an `Orchestrator` and `MediaOrchestrator`
//! the same way the binary does.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use longform::db::{document_repo, section_repo};
use longform::model::{Document, JobSnapshot, Section};
use longform::{
    create_document, Database, DocumentRequest, FileStorage, MediaOrchestrator, OpenGate,
    Orchestrator, PipelineSettings, RetryPolicy, ScriptedProvider,
};

use super::builders::{test_media_config, test_settings};

/// Upper bound on advance calls before a run is considered stuck.
const MAX_ADVANCES: usize = 200;

pub struct TestHarness {
    temp_dir: TempDir,
    pub asset_dir: PathBuf,
    pub db: Database,
    pub provider: Arc<ScriptedProvider>,
    pub media: Arc<MediaOrchestrator>,
    pub orchestrator: Arc<Orchestrator>,
    settings: PipelineSettings,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::new(), test_settings())
    }

    pub fn with_provider(provider: ScriptedProvider, settings: PipelineSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let asset_dir = temp_dir.path().join("assets");
        let db = Database::open_in_memory().expect("Failed to open database");
        let provider = Arc::new(provider);

        let media = Arc::new(MediaOrchestrator::new(
            db.clone(),
            provider.clone(),
            Arc::new(FileStorage::new(&asset_dir)),
            RetryPolicy::immediate(2),
            test_media_config(),
        ));
        let orchestrator = Arc::new(
            Orchestrator::new(
                db.clone(),
                provider.clone(),
                RetryPolicy::immediate(2),
                settings.clone(),
            )
            .with_media(media.clone()),
        );

        Self {
            temp_dir,
            asset_dir,
            db,
            provider,
            media,
            orchestrator,
            settings,
        }
    }

    /// A second orchestrator over the same database and provider, as after a
    /// process restart. It shares no in-memory state with the first.
    pub fn restarted(&self) -> Orchestrator {
        Orchestrator::new(
            self.db.clone(),
            self.provider.clone(),
            RetryPolicy::immediate(2),
            self.settings.clone(),
        )
    }

    pub fn create(&self, request: DocumentRequest) -> JobSnapshot {
        let (_, snapshot) =
            create_document(&self.db, &OpenGate::default(), request).expect("create_document");
        snapshot
    }

    /// Calls `advance` until the job is terminal and returns every snapshot seen.
    pub async fn run_to_terminal(&self, job_id: &str) -> Vec<JobSnapshot> {
        self.run_with(&self.orchestrator, job_id, |s| s.is_terminal())
            .await
    }

    /// Calls `advance` until `stop` holds for the latest snapshot.
    pub async fn run_until<F>(&self, job_id: &str, stop: F) -> Vec<JobSnapshot>
    where
        F: Fn(&JobSnapshot) -> bool,
    {
        self.run_with(&self.orchestrator, job_id, stop).await
    }

    pub async fn run_with<F>(
        &self,
        orchestrator: &Orchestrator,
        job_id: &str,
        stop: F,
    ) -> Vec<JobSnapshot>
    where
        F: Fn(&JobSnapshot) -> bool,
    {
        let mut seen = Vec::new();
        for _ in 0..MAX_ADVANCES {
            let snapshot = orchestrator.advance(job_id).await.expect("advance");
            let done = stop(&snapshot) || snapshot.is_terminal();
            seen.push(snapshot);
            if done {
                return seen;
            }
        }
        panic!("job {} did not settle after {} advances", job_id, MAX_ADVANCES);
    }

    pub fn document(&self, id: &str) -> Document {
        document_repo::find_by_id(&self.db, id)
            .expect("find document")
            .expect("document exists")
    }

    pub fn sections(&self, document_id: &str) -> Vec<Section> {
        section_repo::list_for_document(&self.db, document_id).expect("list sections")
    }
}
