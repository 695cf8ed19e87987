//! Best-effort cleanup of cloud objects when their record is destroyed.

use chrono::{DateTime, Utc};
use cirrus_cache::RetrievalCache;
use cirrus_error::CirrusResult;
use cirrus_storage::{AttachmentRecord, BackendRegistry, KeyCodec};
use std::sync::Arc;

/// Removes cloud objects and their cache entries.
///
/// Failures are logged and never propagated, so a backend outage cannot block
/// destruction of the owning record. Local files belong to the host's own
/// cleanup and are left alone.
#[derive(Debug, Clone)]
pub struct DeletionCoordinator {
    registry: Arc<BackendRegistry>,
    cache: Arc<RetrievalCache>,
}

impl DeletionCoordinator {
    /// Coordinator deleting through `registry` and purging `cache`.
    pub fn new(registry: Arc<BackendRegistry>, cache: Arc<RetrievalCache>) -> Self {
        Self { registry, cache }
    }

    /// Clean up after `record` is destroyed.
    #[tracing::instrument(skip(self, record), fields(record_id = record.id(), key = %record.encoded_key()))]
    pub async fn on_destroy(&self, record: &impl AttachmentRecord) {
        if !KeyCodec::is_cloud(record.encoded_key()) {
            return;
        }

        self.on_destroy_key(record.encoded_key(), record.created_at())
            .await;

        if let Err(e) = self.cache.purge(record.id()).await {
            tracing::warn!(error = %e, "Failed to purge cache entries");
        }
    }

    /// Delete the cloud object behind `encoded_key`, if any.
    pub async fn on_destroy_key(&self, encoded_key: &str, created_at: DateTime<Utc>) {
        if !KeyCodec::is_cloud(encoded_key) {
            return;
        }

        if let Err(e) = self.delete(encoded_key, created_at).await {
            tracing::warn!(error = %e, key = encoded_key, "Cloud delete failed, continuing");
        }
    }

    async fn delete(&self, encoded_key: &str, created_at: DateTime<Utc>) -> CirrusResult<()> {
        let decoded = KeyCodec::decode(encoded_key);
        let kind = *decoded.kind();
        let config = self.registry.get_config(kind)?;
        let client = self.registry.get_client(kind).await?;

        let physical_key = decoded.physical_key(config.path_prefix(), created_at);
        client.delete(&physical_key).await?;
        tracing::info!(kind = %kind, key = %physical_key, "Deleted cloud object");
        Ok(())
    }
}
