use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{AssetStorage, StoredAsset};
use crate::error::StorageError;

/// Numbered variants tried before giving up on a name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Path-addressed storage rooted at the configured asset directory.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects absolute paths and `..` so every write stays under the root.
    fn checked_dir(&self, relative_dir: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative_dir);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StorageError::InvalidPath(relative_dir.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Creates the file exclusively (O_CREAT | O_EXCL), moving on to `stem_2`,
    /// `stem_3`, ... when a name is taken.
    async fn create_exclusive(
        &self,
        dir_path: &Path,
        stem: &str,
        extension: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        for counter in 1..=MAX_NAME_ATTEMPTS {
            let filename = if counter == 1 {
                format!("{}.{}", stem, extension)
            } else {
                format!("{}_{}.{}", stem, counter, extension)
            };
            let try_path = dir_path.join(&filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
                .await
            {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(content).await?;
                        file.flush().await
                    }
                    .await;
                    written.map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    })
                }
            }
        }

        Err(StorageError::FileExists(
            dir_path.join(format!("{}.{}", stem, extension)),
        ))
    }
}

/// Lowercase ASCII slug for use as a file stem. Falls back to `asset`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 60 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "asset".to_string()
    } else {
        slug
    }
}

/// File extension for a MIME type, `bin` when unknown.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        // mime_guess lists jpe/jpeg before jpg
        "image/jpeg" => "jpg",
        _ => mime_guess::get_mime_extensions_str(mime_type)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

#[async_trait]
impl AssetStorage for FileStorage {
    async fn save(
        &self,
        bytes: &[u8],
        relative_dir: &str,
        stem: &str,
        mime_type: &str,
    ) -> Result<StoredAsset, StorageError> {
        let dir_path = self.checked_dir(relative_dir)?;
        self.ensure_directory(&dir_path).await?;

        let path = self
            .create_exclusive(&dir_path, &slugify(stem), extension_for(mime_type), bytes)
            .await?;

        Ok(StoredAsset {
            path,
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_creates_directories() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());

        let stored = storage
            .save(b"png-bytes", "doc-1/banners", "Hero Banner", "image/png")
            .await
            .unwrap();

        assert_eq!(stored.path, temp.path().join("doc-1/banners/hero-banner.png"));
        assert_eq!(stored.size, 9);
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());

        let first = storage
            .save(b"one", "d", "diagram", "image/png")
            .await
            .unwrap();
        let second = storage
            .save(b"two", "d", "diagram", "image/png")
            .await
            .unwrap();

        assert_ne!(first.path, second.path);
        assert!(second.path.ends_with("diagram_2.png"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());

        let err = storage
            .save(b"x", "../outside", "a", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));

        let err = storage
            .save(b"x", "/etc", "a", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Process Overview: v2!"), "process-overview-v2");
        assert_eq!(slugify("   "), "asset");
        assert_eq!(slugify("Ärger"), "rger");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/x-unknown-thing"), "bin");
    }
}
