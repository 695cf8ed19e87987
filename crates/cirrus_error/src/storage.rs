//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Required backend settings are missing. Never retried.
    #[display("Backend not configured: {}", _0)]
    Configuration(String),
    /// Object is absent at the backend
    #[display("Object not found: {}", _0)]
    NotFound(String),
    /// Network or service failure, including timeouts. Eligible for a caller retry.
    #[display("Transient backend failure: {}", _0)]
    Transient(String),
    /// Basename collides with the reserved encoded-key pattern
    #[display("Invalid object key: {}", _0)]
    InvalidKey(String),
    /// Downloaded content failed verification
    #[display("Integrity check failed: {}", _0)]
    Integrity(String),
    /// Operation is not supported by this backend
    #[display("Unsupported operation: {}", _0)]
    Unsupported(String),
    /// Failed to create storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Failed to read file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use cirrus_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("/path/to/file".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, StorageErrorKind::Transient(_))
    }

    /// Whether the object was absent at the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, StorageErrorKind::NotFound(_))
    }
}
