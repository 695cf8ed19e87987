//! Host entry point bundling upload, retrieval, presign and cleanup.

use crate::{
    CirrusSettings, DeletionCoordinator, PresignedUrlIssuer, ThumbnailRenderer, ThumbnailService,
};
use chrono::{DateTime, Utc};
use cirrus_cache::{Resolution, RetrievalCache, RetrievalCacheConfig};
use cirrus_error::{CirrusError, CirrusResult};
use cirrus_storage::{
    AttachmentRecord, BackendRegistry, KeyCodec, RecordId, UploadOutcome, UploadPipeline,
    UploadRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Everything a host application calls from its attachment lifecycle hooks.
///
/// # Example
///
/// ```no_run
/// use cirrus::{CirrusSettings, CloudAttachments};
/// use cirrus_storage::StoredObject;
///
/// # async fn example() -> cirrus_error::CirrusResult<()> {
/// let attachments = CloudAttachments::from_settings(&CirrusSettings::load()?);
///
/// let mut record = StoredObject::new(42, "report.pdf", chrono::Utc::now());
/// attachments.finalize(&mut record, &b"%PDF-1.7"[..]).await?;
///
/// match attachments.direct_download_url(&record, None).await {
///     Some(url) => println!("Redirect to {}", url),
///     None => println!("Serve {}", attachments.resolve(&record).await.display()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CloudAttachments {
    registry: Arc<BackendRegistry>,
    pipeline: UploadPipeline,
    cache: Arc<RetrievalCache>,
    issuer: PresignedUrlIssuer,
    coordinator: DeletionCoordinator,
    thumbnails: Option<ThumbnailService>,
}

impl CloudAttachments {
    /// Wire every component to one registry and cache.
    pub fn new(registry: Arc<BackendRegistry>, cache_config: RetrievalCacheConfig) -> Self {
        let cache = Arc::new(RetrievalCache::new(cache_config, Arc::clone(&registry)));
        Self {
            pipeline: UploadPipeline::new(Arc::clone(&registry)),
            issuer: PresignedUrlIssuer::new(Arc::clone(&registry)),
            coordinator: DeletionCoordinator::new(Arc::clone(&registry), Arc::clone(&cache)),
            thumbnails: None,
            registry,
            cache,
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &CirrusSettings) -> Self {
        Self::new(Arc::new(settings.registry()), settings.cache().clone())
    }

    /// Enable thumbnails rendered by `renderer` under `root`.
    pub fn with_thumbnails(
        mut self,
        root: impl Into<PathBuf>,
        renderer: Arc<dyn ThumbnailRenderer>,
    ) -> Self {
        self.thumbnails = Some(ThumbnailService::new(
            root,
            renderer,
            Arc::clone(&self.cache),
        ));
        self
    }

    /// Backend registry.
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Retrieval cache.
    pub fn cache(&self) -> &Arc<RetrievalCache> {
        &self.cache
    }

    /// Store `content` for `record` and write the outcome onto it.
    ///
    /// Re-uploading a stored record keeps its key and drops stale cache entries.
    ///
    /// # Errors
    ///
    /// Propagates every upload failure; nothing is written to the record then.
    pub async fn finalize<R>(
        &self,
        record: &mut impl AttachmentRecord,
        content: R,
    ) -> CirrusResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let replacing = !record.encoded_key().is_empty();
        let outcome = self
            .pipeline
            .finalize(content, &UploadRequest::for_record(&*record))
            .await?;
        record.apply_upload(&outcome);

        if replacing && let Err(e) = self.cache.purge(record.id()).await {
            tracing::warn!(record_id = record.id(), error = %e, "Failed to purge replaced content");
        }
        Ok(outcome)
    }

    /// Readable local path for `record`.
    pub async fn resolve(&self, record: &impl AttachmentRecord) -> PathBuf {
        self.cache.resolve(record).await
    }

    /// Resolve `record`, reporting how its path was obtained.
    pub async fn resolve_entry(&self, record: &impl AttachmentRecord) -> Resolution {
        self.cache.resolve_entry(record).await
    }

    /// URL to redirect the client to, or `None` to stream the bytes instead.
    pub async fn direct_download_url(
        &self,
        record: &impl AttachmentRecord,
        ttl: Option<Duration>,
    ) -> Option<String> {
        self.issuer.issue(record, ttl).await
    }

    /// Clean up after `record` is destroyed. Never fails.
    pub async fn on_destroy(&self, record: &impl AttachmentRecord) {
        self.coordinator.on_destroy(record).await
    }

    /// Delete the cloud object behind `encoded_key` without a record. Never fails.
    pub async fn delete_object(&self, encoded_key: &str, created_at: DateTime<Utc>) {
        self.coordinator.on_destroy_key(encoded_key, created_at).await
    }

    /// Whether `record`'s content can be served, without downloading it.
    #[tracing::instrument(skip(self, record), fields(record_id = record.id()))]
    pub async fn readable(&self, record: &impl AttachmentRecord) -> bool {
        if !KeyCodec::is_cloud(record.encoded_key()) {
            return tokio::fs::metadata(self.cache.local_path(record))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
        }
        if self.cache.lookup(record).await.is_some() {
            return true;
        }

        let decoded = KeyCodec::decode(record.encoded_key());
        let kind = *decoded.kind();
        let check = async {
            let config = self.registry.get_config(kind)?;
            let client = self.registry.get_client(kind).await?;
            let physical_key = decoded.physical_key(config.path_prefix(), record.created_at());
            let exists = client.exists(&physical_key).await?;
            Ok::<_, CirrusError>(exists)
        };
        match check.await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, "Readability check failed");
                false
            }
        }
    }

    /// Drop cached copies of `record_id`'s content.
    pub async fn purge(&self, record_id: RecordId) -> CirrusResult<()> {
        self.cache.purge(record_id).await
    }

    /// Thumbnail of `record`, if thumbnails are enabled and the content allows it.
    pub async fn thumbnail(
        &self,
        record: &impl AttachmentRecord,
        size: Option<u32>,
    ) -> Option<PathBuf> {
        match &self.thumbnails {
            Some(service) => service.thumbnail(record, size).await,
            None => None,
        }
    }
}
