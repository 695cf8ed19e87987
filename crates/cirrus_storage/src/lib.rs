//! Backend-agnostic object storage for Cirrus attachments.
//!
//! This crate persists attachment content to one of several providers (local
//! filesystem, S3-compatible storage, Google Cloud Storage, Azure Blob Storage)
//! and records where each object lives in a compact encoded key, so no extra
//! metadata table is needed.
//!
//! # Features
//!
//! - **Encoded keys**: backend kind recoverable from the stored filename alone
//! - **Pluggable backends**: one trait, a closed set of provider kinds
//! - **Lazy shared clients**: one client per kind, built on first use
//! - **Content hashing**: SHA-256 computed while the upload is read
//!
//! # Example
//!
//! ```rust,no_run
//! use cirrus_storage::{BackendRegistry, KeyCodec, UploadPipeline, UploadRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(BackendRegistry::builder("/var/cirrus/files").build());
//! let pipeline = UploadPipeline::new(registry);
//!
//! let request = UploadRequest::new("report.pdf", chrono::Utc::now());
//! let outcome = pipeline.finalize(&b"%PDF-1.7"[..], &request).await?;
//!
//! assert!(!KeyCodec::is_cloud(outcome.encoded_key()));
//! assert_eq!(outcome.content_type(), "application/pdf");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cloud;
mod codec;
mod config;
mod content_type;
mod kind;
mod local;
mod record;
mod registry;
mod upload;

pub use backend::{ByteSink, StorageBackend, with_timeout};
pub use cirrus_error::{CirrusError, CirrusResult, StorageError, StorageErrorKind};
pub use cloud::ObjectStoreBackend;
pub use codec::{DecodedKey, KeyCodec};
pub use config::{BackendConfig, DEFAULT_PATH_PREFIX, DEFAULT_PRESIGN_EXPIRY, TimeoutConfig};
pub use content_type::{MAX_CONTENT_TYPE_LEN, is_thumbnailable, resolve_content_type};
pub use kind::BackendKind;
pub use local::LocalBackend;
pub use record::{AttachmentRecord, RecordId, StoredObject};
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use upload::{UploadOutcome, UploadPipeline, UploadRequest};
