//! Presigned direct-download URLs.

use chrono::{DateTime, Utc};
use cirrus_storage::{AttachmentRecord, BackendRegistry, KeyCodec, StorageErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Longest lifetime providers accept for a presigned URL.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Mints time-limited URLs for cloud objects.
///
/// Never fails: `None` means "stream the bytes through the application instead".
#[derive(Debug, Clone)]
pub struct PresignedUrlIssuer {
    registry: Arc<BackendRegistry>,
}

impl PresignedUrlIssuer {
    /// Issuer signing through `registry`'s clients.
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Presigned URL for `record`'s content.
    pub async fn issue(&self, record: &impl AttachmentRecord, ttl: Option<Duration>) -> Option<String> {
        self.issue_for_key(record.encoded_key(), record.created_at(), ttl)
            .await
    }

    /// Presigned URL for the object behind `encoded_key`.
    ///
    /// `ttl` defaults to the backend's `expiry_secs` and is capped at
    /// [`MAX_PRESIGN_TTL`]. Returns `None` for local objects, for a zero ttl,
    /// when the backend lacks its bucket or container setting, or when
    /// signing fails.
    #[tracing::instrument(skip(self))]
    pub async fn issue_for_key(
        &self,
        encoded_key: &str,
        created_at: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Option<String> {
        if !KeyCodec::is_cloud(encoded_key) {
            return None;
        }

        let decoded = KeyCodec::decode(encoded_key);
        let kind = *decoded.kind();

        let config = match self.registry.get_config(kind) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot presign without backend settings");
                return None;
            }
        };
        if let Some(container_key) = kind.container_key()
            && config.value(container_key).is_none()
        {
            tracing::warn!(kind = %kind, setting = container_key, "Cannot presign without a container");
            return None;
        }

        let ttl = ttl.unwrap_or_else(|| config.presign_expiry());
        if ttl.is_zero() {
            return None;
        }
        let ttl = ttl.min(MAX_PRESIGN_TTL);

        let client = match self.registry.get_client(kind).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build client for presigning");
                return None;
            }
        };

        let physical_key = decoded.physical_key(config.path_prefix(), created_at);
        match client.presign(&physical_key, ttl).await {
            Ok(url) => {
                tracing::debug!(kind = %kind, key = %physical_key, ttl = ?ttl, "Issued presigned URL");
                Some(url)
            }
            Err(e) if matches!(e.storage_kind(), Some(StorageErrorKind::Unsupported(_))) => {
                tracing::debug!(kind = %kind, "Backend does not presign");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, key = %physical_key, "Presigning failed");
                None
            }
        }
    }
}
