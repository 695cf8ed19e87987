//! The owning record, as seen by the storage layer.

use crate::UploadOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the record that owns a stored object.
pub type RecordId = u64;

/// Accessors the storage layer needs on the host's attachment record.
///
/// Cirrus never talks to the record store directly; the host implements this
/// trait on its own model and persists whatever [`apply_upload`] writes.
///
/// [`apply_upload`]: AttachmentRecord::apply_upload
pub trait AttachmentRecord {
    /// Stable identifier of the record.
    fn id(&self) -> RecordId;

    /// Creation time, which selects the `YYYY/MM` partition of the physical key.
    fn created_at(&self) -> DateTime<Utc>;

    /// Original filename supplied by the uploader.
    fn filename(&self) -> &str;

    /// Directory of a local object relative to the storage root.
    fn disk_directory(&self) -> Option<&str>;

    /// Encoded key, empty until the first upload completes.
    fn encoded_key(&self) -> &str;

    /// Content type supplied by the uploader or inferred at upload.
    fn content_type(&self) -> &str;

    /// Hex SHA-256 of the content, empty until uploaded.
    fn content_hash(&self) -> &str;

    /// Size of the content in bytes.
    fn size(&self) -> u64;

    /// Write the fields produced by a completed upload.
    fn apply_upload(&mut self, outcome: &UploadOutcome);
}

/// Plain attachment record.
///
/// Useful for hosts without their own model and for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Stable identifier of the record
    pub id: RecordId,
    /// Original filename
    pub filename: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Encoded key written at upload
    #[serde(default)]
    pub encoded_key: String,
    /// Local directory relative to the storage root
    #[serde(default)]
    pub disk_directory: Option<String>,
    /// SHA-256 hex digest
    #[serde(default)]
    pub content_hash: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// MIME type, empty when unknown
    #[serde(default)]
    pub content_type: String,
}

impl StoredObject {
    /// New record that has not been uploaded yet.
    pub fn new(id: RecordId, filename: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: filename.into(),
            created_at,
            encoded_key: String::new(),
            disk_directory: None,
            content_hash: String::new(),
            size: 0,
            content_type: String::new(),
        }
    }

    /// Record for an object already stored under `encoded_key`.
    pub fn with_encoded_key(mut self, encoded_key: impl Into<String>) -> Self {
        self.encoded_key = encoded_key.into();
        self
    }

    /// Set the local directory.
    pub fn with_disk_directory(mut self, directory: impl Into<String>) -> Self {
        self.disk_directory = Some(directory.into());
        self
    }

    /// Set the uploader-supplied content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl AttachmentRecord for StoredObject {
    fn id(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn disk_directory(&self) -> Option<&str> {
        self.disk_directory.as_deref()
    }

    fn encoded_key(&self) -> &str {
        &self.encoded_key
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn apply_upload(&mut self, outcome: &UploadOutcome) {
        self.encoded_key = outcome.encoded_key().clone();
        self.disk_directory = Some(outcome.disk_directory().clone());
        self.content_hash = outcome.content_hash().clone();
        self.size = *outcome.size();
        self.content_type = outcome.content_type().clone();
    }
}
