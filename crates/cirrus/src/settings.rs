//! Settings loading.
//!
//! Sources, lowest precedence first:
//! - Bundled defaults (include_str! from cirrus.toml)
//! - `~/.config/cirrus/cirrus.toml`
//! - `./cirrus.toml`

use cirrus_cache::RetrievalCacheConfig;
use cirrus_error::{CirrusError, CirrusResult, ConfigError};
use cirrus_storage::{BackendConfig, BackendKind, BackendRegistry, TimeoutConfig};
use config::{Config, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG: &str = include_str!("../cirrus.toml");

/// Local storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct LocalSettings {
    /// Root directory of local storage
    root: PathBuf,
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ThumbnailSettings {
    /// Directory holding rendered thumbnails
    root: PathBuf,
}

/// Process-wide Cirrus settings.
///
/// Read once at startup; the registry built from them is immutable.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct CirrusSettings {
    /// Backend receiving new uploads
    #[serde(default = "default_storage")]
    storage: BackendKind,
    /// Local storage
    local: LocalSettings,
    /// Retrieval cache
    cache: RetrievalCacheConfig,
    /// Thumbnails
    thumbnails: ThumbnailSettings,
    /// Backend call timeouts
    #[serde(default)]
    timeouts: TimeoutConfig,
    /// S3 block
    #[serde(default)]
    s3: Option<BTreeMap<String, String>>,
    /// GCS block
    #[serde(default)]
    gcs: Option<BTreeMap<String, String>>,
    /// Azure block
    #[serde(default)]
    azure: Option<BTreeMap<String, String>>,
}

fn default_storage() -> BackendKind {
    BackendKind::Local
}

impl CirrusSettings {
    /// Load settings with precedence: current dir > home dir > bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a file cannot be parsed.
    pub fn load() -> CirrusResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/cirrus/cirrus.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("cirrus").required(false));

        Self::finish(builder)
    }

    /// Load settings from `path`, layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> CirrusResult<Self> {
        debug!(path = %path.as_ref().display(), "Loading configuration from file");

        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));

        Self::finish(builder)
    }

    /// Parse settings from TOML text, layered over the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text cannot be parsed.
    pub fn from_toml(text: &str) -> CirrusResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(text, FileFormat::Toml));

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> CirrusResult<Self> {
        builder
            .build()
            .map_err(|e| {
                CirrusError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                CirrusError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Settings blocks for every configured cloud kind.
    pub fn backend_configs(&self) -> Vec<BackendConfig> {
        [
            (BackendKind::S3, &self.s3),
            (BackendKind::Gcs, &self.gcs),
            (BackendKind::Azure, &self.azure),
        ]
        .into_iter()
        .filter_map(|(kind, block)| {
            block
                .as_ref()
                .map(|values| BackendConfig::from_map(kind, values.clone()))
        })
        .collect()
    }

    /// Build the backend registry these settings describe.
    pub fn registry(&self) -> BackendRegistry {
        self.backend_configs()
            .into_iter()
            .fold(
                BackendRegistry::builder(self.local.root.clone())
                    .select(self.storage)
                    .timeouts(self.timeouts),
                |builder, config| builder.config(config),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults() {
        let settings = CirrusSettings::from_toml("").unwrap();
        assert_eq!(*settings.storage(), BackendKind::Local);
        assert_eq!(settings.local().root(), &PathBuf::from("files"));
        assert_eq!(settings.cache().root(), &PathBuf::from("tmp/cirrus_cache"));
        assert_eq!(*settings.timeouts().request_secs(), 60);
        assert!(settings.backend_configs().is_empty());
    }

    #[test]
    fn test_cloud_block_values_become_strings() {
        let settings = CirrusSettings::from_toml(
            r#"
storage = "s3"

[s3]
bucket = "attachments-prod"
allow_http = true
expiry_secs = 300
"#,
        )
        .unwrap();

        assert_eq!(*settings.storage(), BackendKind::S3);
        let configs = settings.backend_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].require("bucket").unwrap(), "attachments-prod");
        assert!(configs[0].flag("allow_http"));
        assert_eq!(configs[0].presign_expiry().as_secs(), 300);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(CirrusSettings::from_toml("storage = \"ftp\"").is_err());
    }
}
