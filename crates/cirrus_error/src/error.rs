//! Top-level error wrapper types.

use crate::{ConfigError, StorageError, StorageErrorKind};

/// Every error a Cirrus operation can surface.
///
/// # Examples
///
/// ```
/// use cirrus_error::{CirrusError, ConfigError};
///
/// let err: CirrusError = ConfigError::new("Missing [local] root").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum CirrusErrorKind {
    /// Settings file error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Storage backend or cache error
    #[from(StorageError)]
    Storage(StorageError),
}

/// Cirrus error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Cirrus Error: {}", _0)]
pub struct CirrusError(Box<CirrusErrorKind>);

impl CirrusError {
    /// Create a new error from a kind.
    pub fn new(kind: CirrusErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &CirrusErrorKind {
        &self.0
    }

    /// The storage error kind, if this is a storage error.
    pub fn storage_kind(&self) -> Option<&StorageErrorKind> {
        match self.kind() {
            CirrusErrorKind::Storage(e) => Some(&e.kind),
            CirrusErrorKind::Config(_) => None,
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), CirrusErrorKind::Storage(e) if e.is_transient())
    }
}

// Generic From implementation for any type that converts to CirrusErrorKind
impl<T> From<T> for CirrusError
where
    T: Into<CirrusErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Cirrus operations.
pub type CirrusResult<T> = std::result::Result<T, CirrusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kind_exposed() {
        let err: CirrusError =
            StorageError::new(StorageErrorKind::Transient("timed out".into())).into();
        assert!(err.is_transient());
        assert!(matches!(
            err.storage_kind(),
            Some(StorageErrorKind::Transient(_))
        ));
    }

    #[test]
    fn test_config_error_has_no_storage_kind() {
        let err: CirrusError = ConfigError::new("bad toml").into();
        assert!(err.storage_kind().is_none());
        assert!(!err.is_transient());
    }
}
