//! Filesystem-backed storage.
//!
//! Objects live under the storage root at their physical key:
//!
//! ```text
//! /var/cirrus/files/
//! └── 2024/
//!     └── 03/
//!         ├── 240315103000_report.pdf
//!         └── 240315103512_diagram.png
//! ```

use crate::{BackendKind, ByteSink, StorageBackend, with_timeout};
use bytes::Bytes;
use cirrus_error::{CirrusError, CirrusResult, StorageError, StorageErrorKind};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Local filesystem backend.
///
/// # Features
///
/// - **Date-partitioned layout**: physical keys map directly onto paths under the root
/// - **Atomic writes**: temp file + rename, so readers never see a partial object
/// - **Idempotent deletes**: removing a missing file is not an error
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    timeout: Duration,
}

impl LocalBackend {
    /// Create a local backend rooted at `root`.
    ///
    /// Creates the root directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> CirrusResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created local storage");
        Ok(Self { root, timeout })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a physical key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key is empty, absolute, or escapes the root.
    pub fn path_for(&self, key: &str) -> CirrusResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::new(StorageErrorKind::InvalidKey(format!(
                "{} is not a relative object key",
                key
            )))
            .into());
        }
        Ok(self.root.join(relative))
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> CirrusResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp_path =
            path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
            .into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> CirrusResult<String> {
        let path = self.path_for(key)?;
        with_timeout(self.timeout, "put", key, Self::write_atomic(&path, &data)).await?;

        tracing::info!(path = %path.display(), size = data.len(), "Stored local object");
        Ok(key.to_string())
    }

    #[tracing::instrument(skip(self, sink))]
    async fn get(&self, key: &str, sink: &mut ByteSink) -> CirrusResult<u64> {
        let path = self.path_for(key)?;

        let copy = async {
            let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::new(StorageErrorKind::NotFound(key.to_string()))
                } else {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            })?;

            let copied = tokio::io::copy(&mut file, sink).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;
            Ok::<_, CirrusError>(copied)
        };
        let copied = with_timeout(self.timeout, "get", key, copy).await?;

        tracing::debug!(path = %path.display(), size = copied, "Read local object");
        Ok(copied)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> CirrusResult<()> {
        let path = self.path_for(key)?;

        let remove = async {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok::<_, CirrusError>(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                    "delete {}: {}",
                    path.display(),
                    e
                )))
                .into()),
            }
        };

        if with_timeout(self.timeout, "delete", key, remove).await? {
            tracing::info!(path = %path.display(), "Deleted local object");
        } else {
            tracing::debug!(path = %path.display(), "Local object already absent");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> CirrusResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn presign(&self, key: &str, _ttl: Duration) -> CirrusResult<String> {
        Err(StorageError::new(StorageErrorKind::Unsupported(format!(
            "local storage cannot presign {}",
            key
        )))
        .into())
    }
}
