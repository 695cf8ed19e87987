//! Cloud storage backends built on `object_store`.
//!
//! S3, GCS and Azure share one implementation: each provider builder yields a
//! client that implements both `ObjectStore` (put/get/delete/head) and
//! `Signer` (presigned URLs). Required settings are validated before a client
//! is built, so a missing bucket fails fast with a configuration error instead
//! of a provider error on first use.

use crate::{BackendConfig, BackendKind, ByteSink, StorageBackend, TimeoutConfig, with_timeout};
use bytes::Bytes;
use cirrus_error::{CirrusError, CirrusResult, StorageError, StorageErrorKind};
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Backend over any `object_store` client.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    kind: BackendKind,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    timeout: Duration,
}

impl ObjectStoreBackend {
    /// Wrap an existing store. Without a signer, presigning is unsupported.
    pub fn new(
        kind: BackendKind,
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            store,
            signer,
            timeout,
        }
    }

    /// Build the client for a cloud block.
    ///
    /// # Errors
    ///
    /// `Configuration` if required settings are missing or the provider rejects them.
    #[tracing::instrument(skip(config, timeouts), fields(kind = %config.kind()))]
    pub fn from_config(config: &BackendConfig, timeouts: &TimeoutConfig) -> CirrusResult<Self> {
        match config.kind() {
            BackendKind::S3 => build_s3(config, timeouts),
            BackendKind::Gcs => build_gcs(config, timeouts),
            BackendKind::Azure => build_azure(config, timeouts),
            BackendKind::Local => Err(configuration("local storage is not an object store")),
        }
    }

    fn object_path(key: &str) -> CirrusResult<ObjectPath> {
        ObjectPath::parse(key).map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidKey(format!("{}: {}", key, e))).into()
        })
    }
}

fn configuration(message: impl Into<String>) -> CirrusError {
    StorageError::new(StorageErrorKind::Configuration(message.into())).into()
}

/// Map a provider error onto the storage taxonomy.
fn map_store_error(key: &str, err: object_store::Error) -> CirrusError {
    match err {
        object_store::Error::NotFound { .. } => {
            StorageError::new(StorageErrorKind::NotFound(key.to_string())).into()
        }
        object_store::Error::NotImplemented => {
            StorageError::new(StorageErrorKind::Unsupported(key.to_string())).into()
        }
        object_store::Error::InvalidPath { source } => {
            StorageError::new(StorageErrorKind::InvalidKey(format!("{}: {}", key, source))).into()
        }
        other => StorageError::new(StorageErrorKind::Transient(format!("{}: {}", key, other))).into(),
    }
}

fn client_options(timeouts: &TimeoutConfig) -> ClientOptions {
    ClientOptions::new()
        .with_timeout(timeouts.request())
        .with_connect_timeout(timeouts.connect())
}

fn build_s3(config: &BackendConfig, timeouts: &TimeoutConfig) -> CirrusResult<ObjectStoreBackend> {
    let bucket = config.require("bucket")?;

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(config.value("region").unwrap_or("us-east-1"));

    if let Some(endpoint) = config.value("endpoint") {
        // S3-compatible services such as MinIO want path-style requests.
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false);
    }
    if config.flag("allow_http") {
        builder = builder.with_allow_http(true);
    }
    if let Some(access_key_id) = config.value("access_key_id") {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret) = config.value("secret_access_key") {
        builder = builder.with_secret_access_key(secret);
    }
    if let Some(token) = config.value("session_token") {
        builder = builder.with_token(token);
    }

    let store = builder
        .with_client_options(client_options(timeouts))
        .build()
        .map_err(|e| configuration(format!("S3: {}", e)))?;

    tracing::info!(bucket, "Built S3 client");
    let store = Arc::new(store);
    Ok(ObjectStoreBackend::new(
        BackendKind::S3,
        store.clone(),
        Some(store as Arc<dyn Signer>),
        timeouts.request(),
    ))
}

fn build_gcs(config: &BackendConfig, timeouts: &TimeoutConfig) -> CirrusResult<ObjectStoreBackend> {
    let bucket = config.require("bucket")?;

    let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);

    if let Some(key) = config.value("service_account_key") {
        builder = builder.with_service_account_key(key);
    } else if let Some(path) = config.value("service_account_path") {
        builder = builder.with_service_account_path(path);
    }

    let store = builder
        .with_client_options(client_options(timeouts))
        .build()
        .map_err(|e| configuration(format!("GCS: {}", e)))?;

    tracing::info!(bucket, project = ?config.value("project_id"), "Built GCS client");
    let store = Arc::new(store);
    Ok(ObjectStoreBackend::new(
        BackendKind::Gcs,
        store.clone(),
        Some(store as Arc<dyn Signer>),
        timeouts.request(),
    ))
}

fn build_azure(
    config: &BackendConfig,
    timeouts: &TimeoutConfig,
) -> CirrusResult<ObjectStoreBackend> {
    let container = config.require("container")?;
    let account = config.require("account_name")?;

    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(account)
        .with_container_name(container);

    if let Some(key) = config.value("access_key") {
        builder = builder.with_access_key(key);
    }

    let store = builder
        .with_client_options(client_options(timeouts))
        .build()
        .map_err(|e| configuration(format!("Azure: {}", e)))?;

    tracing::info!(account, container, "Built Azure client");
    let store = Arc::new(store);
    Ok(ObjectStoreBackend::new(
        BackendKind::Azure,
        store.clone(),
        Some(store as Arc<dyn Signer>),
        timeouts.request(),
    ))
}

#[async_trait::async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    #[tracing::instrument(skip(self, data), fields(kind = %self.kind, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> CirrusResult<String> {
        let path = Self::object_path(key)?;
        let size = data.len();

        let upload = async {
            self.store
                .put(&path, PutPayload::from(data))
                .await
                .map_err(|e| map_store_error(key, e))
        };
        with_timeout(self.timeout, "put", key, upload).await?;

        tracing::info!(kind = %self.kind, key, size, "Stored cloud object");
        Ok(path.to_string())
    }

    #[tracing::instrument(skip(self, sink), fields(kind = %self.kind))]
    async fn get(&self, key: &str, sink: &mut ByteSink) -> CirrusResult<u64> {
        let path = Self::object_path(key)?;

        let download = async {
            let result = self
                .store
                .get(&path)
                .await
                .map_err(|e| map_store_error(key, e))?;

            let mut stream = result.into_stream();
            let mut copied = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| map_store_error(key, e))?;
                sink.write_all(&chunk).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", key, e)))
                })?;
                copied += chunk.len() as u64;
            }
            sink.flush().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", key, e)))
            })?;
            Ok::<_, CirrusError>(copied)
        };
        let copied = with_timeout(self.timeout, "get", key, download).await?;

        tracing::debug!(kind = %self.kind, key, size = copied, "Downloaded cloud object");
        Ok(copied)
    }

    #[tracing::instrument(skip(self), fields(kind = %self.kind))]
    async fn delete(&self, key: &str) -> CirrusResult<()> {
        let path = Self::object_path(key)?;

        let remove = async {
            match self.store.delete(&path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(e) => Err(map_store_error(key, e)),
            }
        };
        with_timeout(self.timeout, "delete", key, remove).await?;

        tracing::info!(kind = %self.kind, key, "Deleted cloud object");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(kind = %self.kind))]
    async fn exists(&self, key: &str) -> CirrusResult<bool> {
        let path = Self::object_path(key)?;

        let head = async {
            match self.store.head(&path).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(map_store_error(key, e)),
            }
        };
        with_timeout(self.timeout, "exists", key, head).await
    }

    #[tracing::instrument(skip(self), fields(kind = %self.kind))]
    async fn presign(&self, key: &str, ttl: Duration) -> CirrusResult<String> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            CirrusError::from(StorageError::new(StorageErrorKind::Unsupported(format!(
                "{} client cannot presign {}",
                self.kind, key
            ))))
        })?;
        let path = Self::object_path(key)?;

        let url = signer
            .signed_url(http::Method::GET, &path, ttl)
            .await
            .map_err(|e| map_store_error(key, e))?;

        tracing::debug!(kind = %self.kind, key, ttl = ?ttl, "Presigned cloud object");
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bucket_fails_fast() {
        let timeouts = TimeoutConfig::default();
        for config in [
            BackendConfig::new(BackendKind::S3).with("region", "us-east-1"),
            BackendConfig::new(BackendKind::Gcs),
            BackendConfig::new(BackendKind::Azure).with("account_name", "acct"),
            BackendConfig::new(BackendKind::Azure).with("container", "files"),
        ] {
            let err = ObjectStoreBackend::from_config(&config, &timeouts).unwrap_err();
            assert!(matches!(
                err.storage_kind(),
                Some(StorageErrorKind::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_local_block_is_not_an_object_store() {
        let err = ObjectStoreBackend::from_config(
            &BackendConfig::local("/tmp/cirrus"),
            &TimeoutConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.storage_kind(),
            Some(StorageErrorKind::Configuration(_))
        ));
    }

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err = map_store_error(
            "a/b",
            object_store::Error::NotFound {
                path: "a/b".into(),
                source: "missing".into(),
            },
        );
        assert!(matches!(err.storage_kind(), Some(StorageErrorKind::NotFound(_))));
    }
}
