//! Upload pipeline: hash, place, store, encode.

use crate::{AttachmentRecord, BackendKind, BackendRegistry, KeyCodec, resolve_content_type};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

const READ_CHUNK: usize = 64 * 1024;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\-]").expect("Valid filename regex"));

/// What the caller knows about content before it is stored.
#[derive(
    Debug, Clone, PartialEq, Eq, derive_getters::Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_", strip_option, into)]
pub struct UploadRequest {
    /// Original filename, used for content type inference and the generated basename
    #[setters(skip)]
    filename: String,
    /// Creation time of the owning record
    #[setters(skip)]
    created_at: DateTime<Utc>,
    /// Uploader-supplied content type
    content_type: Option<String>,
    /// Stable basename to store under instead of a generated one
    disk_name: Option<String>,
}

impl UploadRequest {
    /// Request for `filename` owned by a record created at `created_at`.
    pub fn new(filename: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            created_at,
            content_type: None,
            disk_name: None,
        }
    }

    /// Request describing a record's content.
    ///
    /// A record that was already stored keeps its basename, so re-uploading
    /// overwrites the same object.
    pub fn for_record(record: &impl AttachmentRecord) -> Self {
        let mut request = Self::new(record.filename(), record.created_at());
        if !record.content_type().trim().is_empty() {
            request = request.with_content_type(record.content_type());
        }
        if !record.encoded_key().is_empty() {
            let decoded = KeyCodec::decode(record.encoded_key());
            request = request.with_disk_name(decoded.basename().as_str());
        }
        request
    }
}

/// Fields produced by a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_getters::Getters)]
pub struct UploadOutcome {
    /// Backend that stored the object
    kind: BackendKind,
    /// Key to persist on the record
    encoded_key: String,
    /// `YYYY/MM` partition of the object
    disk_directory: String,
    /// Key used in provider calls
    physical_key: String,
    /// Hex SHA-256 of the content
    content_hash: String,
    /// Size in bytes
    size: u64,
    /// Stored content type, empty when unknown
    content_type: String,
}

/// Stores uploaded content on the selected backend.
///
/// Backend failures are surfaced to the caller. An upload never falls back to
/// a different backend, which would silently misroute the object.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    registry: Arc<BackendRegistry>,
}

impl UploadPipeline {
    /// Pipeline uploading through `registry`'s selected backend.
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Read `content` once, hash it, store it and produce the encoded key.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the stable basename collides with the reserved pattern
    ///   (checked before any read or backend call)
    /// - `Configuration` if the selected backend is not configured
    /// - `Transient`/`FileRead` from reading or storing the content
    #[tracing::instrument(
        skip(self, content, request),
        fields(filename = %request.filename(), kind = %self.registry.selected())
    )]
    pub async fn finalize<R>(&self, content: R, request: &UploadRequest) -> CirrusResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let kind = self.registry.selected();
        let basename = match request.disk_name() {
            Some(name) => name.clone(),
            None => Self::generate_basename(request.filename()),
        };
        KeyCodec::validate_basename(kind, &basename)?;

        let config = self.registry.get_config(kind)?;
        let physical_key =
            KeyCodec::physical_key(config.path_prefix(), *request.created_at(), &basename);
        let client = self.registry.get_client(kind).await?;

        let (data, content_hash) = Self::read_hashed(content).await?;
        let size = data.len() as u64;

        let stored_key = client.put(&physical_key, data).await?;
        let encoded_key = KeyCodec::encode(kind, &stored_key);
        let content_type =
            resolve_content_type(request.content_type().as_deref(), request.filename());

        tracing::info!(
            kind = %kind,
            encoded_key = %encoded_key,
            hash = %content_hash,
            size,
            "Finalized upload"
        );

        Ok(UploadOutcome {
            kind,
            encoded_key,
            disk_directory: KeyCodec::date_partition(*request.created_at()),
            physical_key: stored_key,
            content_hash,
            size,
            content_type,
        })
    }

    /// Random, collision-resistant basename for `filename`.
    pub fn generate_basename(filename: &str) -> String {
        format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            Self::sanitize_filename(filename)
        )
    }

    /// Replace characters that are unsafe in object keys.
    pub fn sanitize_filename(filename: &str) -> String {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .trim();
        let sanitized = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
        if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
            "file".to_string()
        } else {
            sanitized.into_owned()
        }
    }

    /// Buffer the stream once while hashing it incrementally.
    async fn read_hashed<R>(mut content: R) -> CirrusResult<(Bytes, String)>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut hasher = Sha256::new();
        let mut buffer = BytesMut::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let read = content.read(&mut chunk).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("upload stream: {}", e)))
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
            buffer.extend_from_slice(&chunk[..read]);
        }

        Ok((buffer.freeze(), format!("{:x}", hasher.finalize())))
    }
}
