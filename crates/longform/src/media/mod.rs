//! Media top-up: banners and diagrams for finished documents.
//!
//! [`MediaOrchestrator::ensure_assets`] fills each pool up to its cap and returns
//! the full asset list. It is idempotent: once both pools are full it generates
//! nothing. Individual image failures are logged and skipped.

pub mod diagrams;
pub mod patterns;

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::MediaConfig;
use crate::db::{asset_repo, document_repo, section_repo, Database, DatabaseError};
use crate::model::{Asset, AssetKind, Document};
use crate::pipeline::KeyedLocks;
use crate::provider::{GenerationProvider, ImageRequest, Purpose, RetryPolicy};
use crate::storage::AssetStorage;

use diagrams::DiagramProposal;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    #[error("Document '{0}' is not complete yet")]
    DocumentIncomplete(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One image to generate and store.
struct AssetSpec {
    kind: AssetKind,
    label: String,
    stem: String,
    prompt: String,
    description: String,
}

pub struct MediaOrchestrator {
    db: Database,
    provider: Arc<dyn GenerationProvider>,
    storage: Arc<dyn AssetStorage>,
    retry: RetryPolicy,
    settings: MediaConfig,
    locks: KeyedLocks,
}

impl MediaOrchestrator {
    pub fn new(
        db: Database,
        provider: Arc<dyn GenerationProvider>,
        storage: Arc<dyn AssetStorage>,
        retry: RetryPolicy,
        settings: MediaConfig,
    ) -> Self {
        Self {
            db,
            provider,
            storage,
            retry,
            settings,
            locks: KeyedLocks::new(),
        }
    }

    /// Tops up banners and diagrams for a complete document and returns every asset
    /// it now has, whether or not anything new was created.
    pub async fn ensure_assets(&self, document_id: &str) -> Result<Vec<Asset>, MediaError> {
        let span = info_span!("ensure_assets", document_id = %document_id);
        self.top_up(document_id).instrument(span).await
    }

    async fn top_up(&self, document_id: &str) -> Result<Vec<Asset>, MediaError> {
        let doc = document_repo::find_by_id(&self.db, document_id)?
            .ok_or_else(|| MediaError::DocumentNotFound(document_id.to_string()))?;
        if !doc.is_complete() {
            return Err(MediaError::DocumentIncomplete(document_id.to_string()));
        }

        let _guard = self.locks.acquire(document_id).await;

        let existing = asset_repo::list_for_document(&self.db, document_id)?;
        let (banners, diagrams): (Vec<&Asset>, Vec<&Asset>) =
            existing.iter().partition(|a| a.kind == AssetKind::Banner);

        let banners_needed = AssetKind::Banner.cap().saturating_sub(banners.len() as u32) as usize;
        let diagrams_needed =
            AssetKind::Diagram.cap().saturating_sub(diagrams.len() as u32) as usize;

        if banners_needed == 0 && diagrams_needed == 0 {
            debug!("Asset pools already full");
            return Ok(existing);
        }

        let used_patterns: Vec<&str> = banners.iter().map(|a| a.description.as_str()).collect();
        let diagram_titles: Vec<String> = diagrams.iter().map(|a| a.description.clone()).collect();

        let new_banners = if banners_needed > 0 {
            self.add_banners(&doc, &used_patterns, banners_needed).await?
        } else {
            0
        };
        let new_diagrams = if diagrams_needed > 0 {
            self.add_diagrams(&doc, &diagram_titles, diagrams_needed)
                .await?
        } else {
            0
        };

        info!(
            new_banners,
            new_diagrams,
            banners_needed,
            diagrams_needed,
            "Asset top-up finished"
        );
        Ok(asset_repo::list_for_document(&self.db, document_id)?)
    }

    /// Issues the banner requests as one concurrent batch.
    async fn add_banners(
        &self,
        doc: &Document,
        used_patterns: &[&str],
        needed: usize,
    ) -> Result<usize, MediaError> {
        let picks = patterns::select_patterns(used_patterns, needed, &mut rand::rng());
        let title = doc.display_title();

        let batch = picks.into_iter().map(|pattern| {
            self.produce(
                doc,
                AssetSpec {
                    kind: AssetKind::Banner,
                    label: pattern.name.to_string(),
                    stem: pattern.name.to_string(),
                    prompt: patterns::banner_prompt(pattern, title),
                    description: pattern.name.to_string(),
                },
            )
        });

        let mut created = 0;
        for result in join_all(batch).await {
            if result? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Proposes diagrams, fills gaps from headings, then generates them one at a
    /// time with a fixed pause in between.
    async fn add_diagrams(
        &self,
        doc: &Document,
        existing_titles: &[String],
        needed: usize,
    ) -> Result<usize, MediaError> {
        let request = diagrams::proposals_request(doc, needed, existing_titles);
        let proposed = match self
            .retry
            .run("diagram_proposals", || self.provider.generate(&request))
            .await
            .and_then(diagrams::parse_proposals)
        {
            Ok(proposed) => proposed,
            Err(e) => {
                warn!(error = %e, "Diagram proposals failed, falling back to headings");
                Vec::new()
            }
        };
        let proposed_count = proposed.len();

        let headings: Vec<String> = section_repo::list_for_document(&self.db, &doc.id)?
            .iter()
            .map(|s| s.heading())
            .collect();
        let planned = diagrams::plan_diagrams(proposed, existing_titles, &headings, needed);
        debug!(proposed = proposed_count, planned = planned.len(), "Diagrams planned");

        let pacing = self.settings.pacing();
        let mut created = 0;
        for (i, proposal) in planned.iter().enumerate() {
            if i > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            if self.produce(doc, diagram_spec(doc, proposal)).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Generates, stores and records one image. `Ok(false)` means the item was
    /// skipped; only database errors propagate.
    async fn produce(&self, doc: &Document, spec: AssetSpec) -> Result<bool, MediaError> {
        let (purpose, size) = match spec.kind {
            AssetKind::Banner => (Purpose::Banner, self.settings.banner_size),
            AssetKind::Diagram => (Purpose::Diagram, self.settings.diagram_size),
        };
        let request = ImageRequest {
            purpose,
            label: spec.label.clone(),
            prompt: spec.prompt,
            size,
        };

        let image = match self
            .retry
            .run(purpose.as_str(), || self.provider.generate_image(&request))
            .await
        {
            Ok(image) => image,
            Err(e) => {
                warn!(kind = spec.kind.as_str(), label = %spec.label, error = %e, "Image generation failed, skipping");
                return Ok(false);
            }
        };

        let dir = format!("{}/{}", doc.id, spec.kind.dir_name());
        let stored = match self
            .storage
            .save(&image.bytes, &dir, &spec.stem, &image.mime_type)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(kind = spec.kind.as_str(), label = %spec.label, error = %e, "Saving image failed, skipping");
                return Ok(false);
            }
        };

        let asset = Asset {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            kind: spec.kind,
            prompt: request.prompt,
            description: spec.description,
            file_path: stored.path.display().to_string(),
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
            size_bytes: stored.size,
            created_at: Utc::now(),
        };

        if asset_repo::insert_capped(&self.db, &asset)? {
            debug!(kind = asset.kind.as_str(), path = %asset.file_path, "Asset stored");
            Ok(true)
        } else {
            warn!(
                kind = asset.kind.as_str(),
                path = %asset.file_path,
                "Pool already full, asset not recorded"
            );
            Ok(false)
        }
    }
}

fn diagram_spec(doc: &Document, proposal: &DiagramProposal) -> AssetSpec {
    AssetSpec {
        kind: AssetKind::Diagram,
        label: proposal.title.clone(),
        stem: proposal.title.clone(),
        prompt: diagrams::diagram_prompt(doc.display_title(), proposal),
        description: proposal.title.clone(),
    }
}
