//! Binary asset storage. The media orchestrator only ever calls [`AssetStorage::save`].

pub mod filesystem;

pub use filesystem::FileStorage;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::StorageError;

/// Where a saved asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub size: u64,
}

#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Persists `bytes` under `relative_dir`, naming the file after `stem` with an
    /// extension derived from `mime_type`. Never overwrites an existing file.
    async fn save(
        &self,
        bytes: &[u8],
        relative_dir: &str,
        stem: &str,
        mime_type: &str,
    ) -> Result<StoredAsset, StorageError>;
}
