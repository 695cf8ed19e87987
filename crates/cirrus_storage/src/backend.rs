//! Storage backend trait definition.

use crate::BackendKind;
use bytes::Bytes;
use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
use std::future::Future;
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Writable byte destination for [`StorageBackend::get`].
pub type ByteSink = dyn AsyncWrite + Unpin + Send;

/// Trait for pluggable object storage backends.
///
/// Every implementation addresses objects by a physical key (a `/`-separated
/// path relative to the backend's root or bucket). Metadata such as the owning
/// record, hash and content type is managed by the caller.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Which provider this backend talks to.
    fn kind(&self) -> BackendKind;

    /// Store bytes under `key` and return the physical key.
    ///
    /// Retrying with the same key and bytes overwrites the object in place.
    async fn put(&self, key: &str, data: Bytes) -> CirrusResult<String>;

    /// Stream the object at `key` into `sink`, returning the byte count.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object is absent, `Transient` on network or service
    /// failure (including timeouts).
    async fn get(&self, key: &str, sink: &mut ByteSink) -> CirrusResult<u64>;

    /// Remove the object at `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> CirrusResult<()>;

    /// Check whether an object exists at `key` without reading it.
    async fn exists(&self, key: &str) -> CirrusResult<bool>;

    /// Mint a read-only URL for `key` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// `Unsupported` when the backend cannot hand out direct URLs.
    async fn presign(&self, key: &str, ttl: Duration) -> CirrusResult<String>;
}

/// Run a backend call under `limit`, reporting an overrun as a transient failure.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, key: &str, call: F) -> CirrusResult<T>
where
    F: Future<Output = CirrusResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, key, timeout = ?limit, "Backend call timed out");
            Err(StorageError::new(StorageErrorKind::Transient(format!(
                "{} {} timed out after {:?}",
                operation, key, limit
            )))
            .into())
        }
    }
}
