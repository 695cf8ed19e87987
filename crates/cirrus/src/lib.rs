//! Cirrus: backend-agnostic attachment storage.
//!
//! Attachments are stored on the local filesystem, S3-compatible storage,
//! Google Cloud Storage or Azure Blob Storage. The backend that owns an object
//! is recorded in its encoded key, so records need no extra columns and old
//! objects stay readable after the selected backend changes.
//!
//! # Features
//!
//! - **Uploads**: hashed, date-partitioned, routed to the selected backend
//! - **Retrieval cache**: cloud objects downloaded once per record
//! - **Direct downloads**: presigned URLs with configurable expiry
//! - **Cleanup**: best-effort deletion that never blocks the host
//! - **Thumbnails**: pluggable renderer over resolved content
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cirrus::{CirrusSettings, CloudAttachments};
//! use cirrus_storage::StoredObject;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let attachments = CloudAttachments::from_settings(&CirrusSettings::load()?);
//!
//!     let mut record = StoredObject::new(1, "hello.txt", chrono::Utc::now());
//!     attachments.finalize(&mut record, &b"hello"[..]).await?;
//!
//!     println!("Stored as {}", record.encoded_key);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod attachments;
mod deletion;
mod presign;
mod settings;
mod telemetry;
mod thumbnail;

pub use attachments::CloudAttachments;
pub use deletion::DeletionCoordinator;
pub use presign::{MAX_PRESIGN_TTL, PresignedUrlIssuer};
pub use settings::{CirrusSettings, LocalSettings, ThumbnailSettings};
pub use telemetry::init_tracing;
pub use thumbnail::{
    DEFAULT_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE, ThumbnailRenderer, ThumbnailService,
    normalize_size,
};

// Re-export the building blocks
pub use cirrus_cache::{Resolution, RetrievalCache, RetrievalCacheConfig};
pub use cirrus_error::{CirrusError, CirrusErrorKind, CirrusResult, ConfigError};
pub use cirrus_storage::{
    AttachmentRecord, BackendConfig, BackendKind, BackendRegistry, KeyCodec, RecordId,
    StorageBackend, StorageError, StorageErrorKind, StoredObject, UploadOutcome, UploadPipeline,
    UploadRequest,
};
