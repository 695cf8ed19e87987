//! Retrieval cache implementation.

use crate::RetrievalCacheConfig;
use chrono::{DateTime, Utc};
use cirrus_error::{CirrusError, CirrusResult, StorageError, StorageErrorKind};
use cirrus_storage::{AttachmentRecord, BackendRegistry, DecodedKey, KeyCodec, RecordId};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Where a resolved object can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Object lives in local storage.
    Local(PathBuf),
    /// Non-empty cache entry was already present.
    Hit(PathBuf),
    /// Object was downloaded into the cache by this call.
    Downloaded(PathBuf),
    /// Download failed; the local storage path is returned as a best effort.
    Degraded(PathBuf),
}

impl Resolution {
    /// Path to read from.
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) | Self::Hit(path) | Self::Downloaded(path) | Self::Degraded(path) => {
                path
            }
        }
    }

    /// Consume the resolution, returning its path.
    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Local(path) | Self::Hit(path) | Self::Downloaded(path) | Self::Degraded(path) => {
                path
            }
        }
    }

    /// Whether this is a fallback after a failed download.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Serves attachments from local disk, downloading cloud objects on first access.
///
/// Cache entries live at `<root>/<record_id>/<basename>`. Resolution of one
/// record is serialized, so concurrent callers trigger at most one download;
/// entries are written to a temporary name and renamed into place, so a
/// reader never observes a partial file.
///
/// # Example
///
/// ```no_run
/// use cirrus_cache::{RetrievalCache, RetrievalCacheConfig};
/// use cirrus_storage::{BackendRegistry, StoredObject};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let registry = Arc::new(BackendRegistry::builder("/var/cirrus/files").build());
/// let cache = RetrievalCache::new(RetrievalCacheConfig::new("/var/cirrus/cache"), registry);
///
/// let record = StoredObject::new(42, "report.pdf", chrono::Utc::now())
///     .with_encoded_key("s3_9f2ce1_report.pdf");
/// let path = cache.resolve(&record).await;
/// println!("Read from {}", path.display());
/// # }
/// ```
#[derive(Debug)]
pub struct RetrievalCache {
    config: RetrievalCacheConfig,
    registry: Arc<BackendRegistry>,
    locks: Mutex<HashMap<RecordId, Arc<Mutex<()>>>>,
}

impl RetrievalCache {
    /// Create a cache downloading through `registry`.
    pub fn new(config: RetrievalCacheConfig, registry: Arc<BackendRegistry>) -> Self {
        tracing::debug!(root = %config.root().display(), "Creating RetrievalCache");
        Self {
            config,
            registry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Deterministic cache path for `basename` owned by `record_id`.
    pub fn cache_path(&self, record_id: RecordId, basename: &str) -> PathBuf {
        self.config
            .root()
            .join(record_id.to_string())
            .join(basename)
    }

    /// Local storage path of a record.
    ///
    /// For cloud records this is the degraded fallback, which normally does not exist.
    /// Keys that are not a single file name, or disk directories that leave the
    /// storage root, map to the root directory itself, which is never a readable file.
    pub fn local_path(&self, record: &impl AttachmentRecord) -> PathBuf {
        self.stored_path(record)
            .unwrap_or_else(|| self.registry.local_root().to_path_buf())
    }

    fn stored_path(&self, record: &impl AttachmentRecord) -> Option<PathBuf> {
        let encoded_key = record.encoded_key();
        if !KeyCodec::is_plain_name(encoded_key) {
            return None;
        }

        let mut path = self.registry.local_root().to_path_buf();
        if let Some(directory) = record.disk_directory().filter(|d| !d.is_empty()) {
            let contained = Path::new(directory)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if !contained {
                return None;
            }
            path.push(directory);
        }
        path.push(encoded_key);
        Some(path)
    }

    /// Readable local path for `record`.
    ///
    /// Never fails: when the backend is unreachable the local storage path is
    /// returned, and callers treat a missing file as unavailable.
    pub async fn resolve(&self, record: &impl AttachmentRecord) -> PathBuf {
        self.resolve_entry(record).await.into_path()
    }

    /// Resolve `record`, reporting how its path was obtained.
    ///
    /// Records whose key cannot name a file inside the storage root resolve to
    /// `Degraded` without touching the filesystem.
    #[tracing::instrument(skip(self, record), fields(record_id = record.id(), key = %record.encoded_key()))]
    pub async fn resolve_entry(&self, record: &impl AttachmentRecord) -> Resolution {
        let encoded_key = record.encoded_key();
        let Some(stored_path) = self.stored_path(record) else {
            tracing::warn!("Encoded key does not name a stored file");
            return Resolution::Degraded(self.registry.local_root().to_path_buf());
        };
        if !KeyCodec::is_cloud(encoded_key) {
            return Resolution::Local(stored_path);
        }

        let decoded = KeyCodec::decode(encoded_key);
        let cache_path = self.cache_path(record.id(), decoded.basename());

        let lock = self.lock_for(record.id()).await;
        let resolution = {
            let _guard = lock.lock().await;

            match entry_len(&cache_path).await {
                Some(len) if len > 0 => {
                    tracing::debug!(path = %cache_path.display(), "Cache hit");
                    Resolution::Hit(cache_path)
                }
                existing => {
                    if existing == Some(0) {
                        tracing::warn!(path = %cache_path.display(), "Purging empty cache entry");
                        remove_quietly(&cache_path).await;
                    }

                    let download = self
                        .download(&decoded, record.created_at(), &cache_path)
                        .await;

                    match download {
                        Ok(size) => {
                            tracing::info!(path = %cache_path.display(), size, "Cached cloud object");
                            Resolution::Downloaded(cache_path)
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                fallback = %stored_path.display(),
                                "Cloud download failed, degrading to local path"
                            );
                            Resolution::Degraded(stored_path)
                        }
                    }
                }
            }
        };

        self.release(record.id(), lock).await;
        resolution
    }

    /// Non-empty cache entry for a cloud record, without downloading.
    pub async fn lookup(&self, record: &impl AttachmentRecord) -> Option<PathBuf> {
        if !KeyCodec::is_cloud(record.encoded_key()) {
            return None;
        }
        let decoded = KeyCodec::decode(record.encoded_key());
        let path = self.cache_path(record.id(), decoded.basename());
        match entry_len(&path).await {
            Some(len) if len > 0 => Some(path),
            _ => None,
        }
    }

    /// Drop every cache entry of `record_id`.
    ///
    /// Call after the record's content is replaced or deleted. Purging an
    /// uncached record succeeds.
    ///
    /// # Errors
    ///
    /// `FileWrite` if the directory exists but cannot be removed.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, record_id: RecordId) -> CirrusResult<()> {
        let lock = self.lock_for(record_id).await;
        let result = {
            let _guard = lock.lock().await;
            let directory = self.config.root().join(record_id.to_string());
            match tokio::fs::remove_dir_all(&directory).await {
                Ok(()) => {
                    tracing::info!(path = %directory.display(), "Purged cache entries");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    directory.display(),
                    e
                )))
                .into()),
            }
        };
        self.release(record_id, lock).await;
        result
    }

    /// Download the object behind `decoded` into `target` through a temporary file.
    async fn download(
        &self,
        decoded: &DecodedKey,
        created_at: DateTime<Utc>,
        target: &Path,
    ) -> CirrusResult<u64> {
        let kind = *decoded.kind();
        let config = self.registry.get_config(kind)?;
        let physical_key = decoded.physical_key(config.path_prefix(), created_at);
        let client = self.registry.get_client(kind).await?;

        let directory = target.parent().unwrap_or(self.config.root().as_path());
        tokio::fs::create_dir_all(directory).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                directory.display(),
                e
            )))
        })?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = directory.join(format!(".{}.{}.part", name, Uuid::new_v4().simple()));

        let fetch = async {
            let mut file = tokio::fs::File::create(&temp).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    temp.display(),
                    e
                )))
            })?;
            client.get(&physical_key, &mut file).await?;
            file.flush().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    temp.display(),
                    e
                )))
            })?;
            drop(file);

            let size = entry_len(&temp).await.unwrap_or(0);
            if size == 0 {
                return Err(StorageError::new(StorageErrorKind::Integrity(format!(
                    "{} downloaded as an empty file",
                    physical_key
                )))
                .into());
            }

            tokio::fs::rename(&temp, target).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    target.display(),
                    e
                )))
            })?;
            Ok::<_, CirrusError>(size)
        };

        let result = fetch.await;
        if result.is_err() {
            remove_quietly(&temp).await;
        }
        result
    }

    async fn lock_for(&self, record_id: RecordId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(record_id).or_default())
    }

    /// Forget the lock of `record_id` once nobody else holds it.
    async fn release(&self, record_id: RecordId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(&record_id);
        }
    }
}

/// Size of the file at `path`, or `None` if it is absent.
async fn entry_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
    }
}
