//! Backend configuration and lazily built, shared clients.

use crate::{BackendConfig, BackendKind, LocalBackend, ObjectStoreBackend, StorageBackend, TimeoutConfig};
use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::OnceCell;

/// Process-wide backend settings plus one memoized client per kind.
///
/// Clients are built on first use. Concurrent first use of a kind builds
/// exactly one client; every later caller shares it.
///
/// # Example
///
/// ```no_run
/// use cirrus_storage::{BackendConfig, BackendKind, BackendRegistry};
///
/// # async fn example() -> cirrus_error::CirrusResult<()> {
/// let registry = BackendRegistry::builder("/var/cirrus/files")
///     .select(BackendKind::S3)
///     .config(BackendConfig::new(BackendKind::S3).with("bucket", "attachments"))
///     .build();
///
/// let client = registry.get_client(registry.selected()).await?;
/// assert_eq!(client.kind(), BackendKind::S3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BackendRegistry {
    selected: BackendKind,
    local_root: PathBuf,
    timeouts: TimeoutConfig,
    configs: HashMap<BackendKind, BackendConfig>,
    clients: HashMap<BackendKind, OnceCell<Arc<dyn StorageBackend>>>,
}

impl BackendRegistry {
    /// Start building a registry whose local backend lives under `local_root`.
    pub fn builder(local_root: impl Into<PathBuf>) -> BackendRegistryBuilder {
        BackendRegistryBuilder {
            selected: BackendKind::Local,
            local_root: local_root.into(),
            timeouts: TimeoutConfig::default(),
            configs: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    /// Backend new uploads go to.
    pub fn selected(&self) -> BackendKind {
        self.selected
    }

    /// Root directory of local storage.
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Timeouts applied to backend calls.
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Settings block for `kind`.
    ///
    /// # Errors
    ///
    /// `Configuration` if no block was loaded for `kind`.
    pub fn get_config(&self, kind: BackendKind) -> CirrusResult<&BackendConfig> {
        self.configs.get(&kind).ok_or_else(|| {
            StorageError::new(StorageErrorKind::Configuration(format!(
                "no [{}] storage settings",
                kind
            )))
            .into()
        })
    }

    /// Shared client for `kind`, built on first use.
    ///
    /// # Errors
    ///
    /// `Configuration` if the kind has no settings or they are incomplete.
    /// A failed build is not memoized; the next call tries again.
    #[tracing::instrument(skip(self))]
    pub async fn get_client(&self, kind: BackendKind) -> CirrusResult<Arc<dyn StorageBackend>> {
        let cell = self.clients.get(&kind).ok_or_else(|| {
            StorageError::new(StorageErrorKind::Configuration(format!(
                "no client slot for {}",
                kind
            )))
        })?;

        let client = cell
            .get_or_try_init(|| async { self.build_client(kind) })
            .await?;
        Ok(Arc::clone(client))
    }

    fn build_client(&self, kind: BackendKind) -> CirrusResult<Arc<dyn StorageBackend>> {
        let config = self.get_config(kind)?;
        tracing::info!(kind = %kind, "Building storage client");

        let client: Arc<dyn StorageBackend> = match kind {
            BackendKind::Local => Arc::new(LocalBackend::new(
                self.local_root.clone(),
                self.timeouts.request(),
            )?),
            BackendKind::S3 | BackendKind::Gcs | BackendKind::Azure => {
                Arc::new(ObjectStoreBackend::from_config(config, &self.timeouts)?)
            }
        };
        Ok(client)
    }
}

/// Builder for [`BackendRegistry`].
#[derive(Debug)]
pub struct BackendRegistryBuilder {
    selected: BackendKind,
    local_root: PathBuf,
    timeouts: TimeoutConfig,
    configs: HashMap<BackendKind, BackendConfig>,
    clients: HashMap<BackendKind, Arc<dyn StorageBackend>>,
}

impl BackendRegistryBuilder {
    /// Backend that receives new uploads. Defaults to local.
    pub fn select(mut self, kind: BackendKind) -> Self {
        self.selected = kind;
        self
    }

    /// Timeouts for backend calls.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Add the settings block for one cloud kind.
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.configs.insert(*config.kind(), config);
        self
    }

    /// Pre-seed the client for a kind instead of building it from settings.
    pub fn client(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.clients.insert(backend.kind(), backend);
        self
    }

    /// Finish the registry.
    pub fn build(mut self) -> BackendRegistry {
        self.configs
            .entry(BackendKind::Local)
            .or_insert_with(|| BackendConfig::local(self.local_root.clone()));

        let clients = BackendKind::iter()
            .map(|kind| (kind, OnceCell::new_with(self.clients.remove(&kind))))
            .collect();

        BackendRegistry {
            selected: self.selected,
            local_root: self.local_root,
            timeouts: self.timeouts,
            configs: self.configs,
            clients,
        }
    }
}
