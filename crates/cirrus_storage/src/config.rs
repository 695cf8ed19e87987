//! Per-backend configuration blocks.

use crate::BackendKind;
use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Physical key prefix used when a cloud block sets no `path`.
pub const DEFAULT_PATH_PREFIX: &str = "attachments";

/// Presigned URL lifetime used when a cloud block sets no `expiry_secs`.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

const SECRET_KEYS: &[&str] = &[
    "secret_access_key",
    "session_token",
    "access_key",
    "service_account_key",
];

/// Flat key/value settings for one backend kind.
///
/// Loaded once at startup and never mutated. A missing block makes the kind
/// unusable; every operation against it fails with a configuration error.
///
/// # Example
///
/// ```
/// use cirrus_storage::{BackendConfig, BackendKind};
///
/// let config = BackendConfig::new(BackendKind::S3)
///     .with("bucket", "attachments-prod")
///     .with("region", "eu-west-1");
///
/// assert_eq!(config.require("bucket").unwrap(), "attachments-prod");
/// assert_eq!(config.path_prefix(), "attachments");
/// assert!(config.require("access_key_id").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct BackendConfig {
    kind: BackendKind,
    values: BTreeMap<String, String>,
}

impl BackendConfig {
    /// Create an empty block for `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    /// Create a block from an existing key/value map.
    pub fn from_map<I, K, V>(kind: BackendKind, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            kind,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Block for the local backend rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new(BackendKind::Local).with("root", root.into().to_string_lossy())
    }

    /// Set a value, returning the updated block.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// A non-blank value for `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A non-blank value for `key`, or a configuration error naming it.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the key is absent or blank.
    pub fn require(&self, key: &str) -> CirrusResult<&str> {
        self.value(key).ok_or_else(|| {
            StorageError::new(StorageErrorKind::Configuration(format!(
                "[{}] is missing required setting '{}'",
                self.kind, key
            )))
            .into()
        })
    }

    /// Boolean flag, accepting `true`/`1`/`yes`.
    pub fn flag(&self, key: &str) -> bool {
        self.value(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// Physical key prefix for objects of this kind.
    ///
    /// Local objects are laid out directly under the storage root.
    pub fn path_prefix(&self) -> &str {
        if !self.kind.is_cloud() {
            return "";
        }
        self.value("path").unwrap_or(DEFAULT_PATH_PREFIX)
    }

    /// Default presigned URL lifetime for this kind.
    pub fn presign_expiry(&self) -> Duration {
        self.value("expiry_secs")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PRESIGN_EXPIRY)
    }

    /// Values with secrets masked, for display.
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                if SECRET_KEYS.contains(&k.as_str()) && !v.is_empty() {
                    (k.clone(), "********".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }
}

/// Timeouts applied to every remote backend call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_secs")]
    request_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_secs")]
    connect_secs: u64,
}

fn default_request_secs() -> u64 {
    60
}

fn default_connect_secs() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
            connect_secs: default_connect_secs(),
        }
    }
}

impl TimeoutConfig {
    /// Create a timeout configuration.
    pub fn new(request_secs: u64, connect_secs: u64) -> Self {
        Self {
            request_secs,
            connect_secs,
        }
    }

    /// Request timeout as a duration.
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    /// Connect timeout as a duration.
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}
