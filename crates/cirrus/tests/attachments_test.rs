//! End-to-end tests for the host entry point.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use cirrus::{
    BackendConfig, BackendKind, BackendRegistry, CirrusResult, CloudAttachments, KeyCodec,
    RetrievalCacheConfig, StorageBackend, StorageError, StorageErrorKind, StoredObject,
    ThumbnailRenderer,
};
use cirrus_storage::{ByteSink, ObjectStoreBackend};
use object_store::memory::InMemory;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// S3 stand-in whose deletes and lookups can be made to fail.
#[derive(Debug)]
struct FlakyBackend {
    inner: ObjectStoreBackend,
    outage: bool,
}

impl FlakyBackend {
    fn new(outage: bool) -> Self {
        Self {
            inner: ObjectStoreBackend::new(
                BackendKind::S3,
                Arc::new(InMemory::new()),
                None,
                Duration::from_secs(5),
            ),
            outage,
        }
    }

    fn check(&self) -> CirrusResult<()> {
        if self.outage {
            return Err(StorageError::new(StorageErrorKind::Transient("503".to_string())).into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    async fn put(&self, key: &str, data: Bytes) -> CirrusResult<String> {
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str, sink: &mut ByteSink) -> CirrusResult<u64> {
        self.check()?;
        self.inner.get(key, sink).await
    }

    async fn delete(&self, key: &str) -> CirrusResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> CirrusResult<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn presign(&self, key: &str, ttl: Duration) -> CirrusResult<String> {
        self.inner.presign(key, ttl).await
    }
}

/// Renderer that copies the source and counts calls.
#[derive(Debug, Default)]
struct CopyRenderer {
    renders: AtomicUsize,
}

impl ThumbnailRenderer for CopyRenderer {
    fn render(&self, source: &Path, target: &Path, _size: u32) -> bool {
        self.renders.fetch_add(1, Ordering::SeqCst);
        std::fs::copy(source, target).is_ok()
    }
}

struct Fixture {
    dir: TempDir,
    backend: Arc<FlakyBackend>,
    attachments: CloudAttachments,
}

fn fixture(selected: BackendKind, outage: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlakyBackend::new(outage));
    let registry = BackendRegistry::builder(dir.path().join("files"))
        .select(selected)
        .config(BackendConfig::new(BackendKind::S3).with("bucket", "cirrus-test"))
        .client(backend.clone())
        .build();
    let attachments = CloudAttachments::new(
        Arc::new(registry),
        RetrievalCacheConfig::new(dir.path().join("cache")),
    );
    Fixture {
        dir,
        backend,
        attachments,
    }
}

fn physical_key(record: &StoredObject) -> String {
    KeyCodec::decode(&record.encoded_key).physical_key("attachments", record.created_at)
}

#[tokio::test]
async fn test_upload_resolve_and_replace() {
    let fixture = fixture(BackendKind::S3, false);
    let created_at = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
    let mut record = StoredObject::new(21, "hello.txt", created_at);

    fixture
        .attachments
        .finalize(&mut record, &b"hello"[..])
        .await
        .unwrap();
    assert!(record.encoded_key.starts_with("s3_"));
    assert_eq!(record.content_type, "text/plain");

    let path = fixture.attachments.resolve(&record).await;
    assert_eq!(std::fs::read(&path).unwrap(), b"hello");

    let original_key = record.encoded_key.clone();
    fixture
        .attachments
        .finalize(&mut record, &b"hello again"[..])
        .await
        .unwrap();
    assert_eq!(record.encoded_key, original_key);

    let path = fixture.attachments.resolve(&record).await;
    assert_eq!(std::fs::read(&path).unwrap(), b"hello again");
}

#[tokio::test]
async fn test_on_destroy_deletes_cloud_object_and_cache() {
    let fixture = fixture(BackendKind::S3, false);
    let mut record = StoredObject::new(22, "data.csv", Utc::now());
    fixture
        .attachments
        .finalize(&mut record, &b"a,b\n1,2\n"[..])
        .await
        .unwrap();
    fixture.attachments.resolve(&record).await;

    fixture.attachments.on_destroy(&record).await;

    assert!(!fixture.backend.exists(&physical_key(&record)).await.unwrap());
    assert!(!fixture.attachments.cache().root().join("22").exists());
    assert!(!fixture.attachments.readable(&record).await);

    // A second destroy is harmless.
    fixture.attachments.on_destroy(&record).await;
}

#[tokio::test]
async fn test_on_destroy_leaves_local_files_alone() {
    let fixture = fixture(BackendKind::Local, false);
    let mut record = StoredObject::new(23, "notes.txt", Utc::now());
    fixture
        .attachments
        .finalize(&mut record, &b"keep me"[..])
        .await
        .unwrap();

    fixture.attachments.on_destroy(&record).await;

    let path = fixture.attachments.resolve(&record).await;
    assert!(path.starts_with(fixture.dir.path().join("files")));
    assert_eq!(std::fs::read(path).unwrap(), b"keep me");
    assert!(fixture.attachments.readable(&record).await);
}

#[tokio::test]
async fn test_backend_outage_never_escapes() {
    let fixture = fixture(BackendKind::S3, true);
    let mut record = StoredObject::new(24, "report.pdf", Utc::now());
    fixture
        .attachments
        .finalize(&mut record, &b"%PDF"[..])
        .await
        .unwrap();

    fixture.attachments.on_destroy(&record).await;
    assert!(!fixture.attachments.readable(&record).await);

    let resolution = fixture.attachments.resolve_entry(&record).await;
    assert!(resolution.is_degraded());
    assert!(!resolution.path().exists());
}

#[tokio::test]
async fn test_readable_checks_backend_without_download() {
    let fixture = fixture(BackendKind::S3, false);
    let mut record = StoredObject::new(25, "photo.png", Utc::now());
    fixture
        .attachments
        .finalize(&mut record, &b"\x89PNG"[..])
        .await
        .unwrap();

    assert!(fixture.attachments.readable(&record).await);
    assert!(fixture.attachments.cache().lookup(&record).await.is_none());

    let missing = StoredObject::new(26, "gone.png", Utc::now()).with_encoded_key("s3_0000_gone.png");
    assert!(!fixture.attachments.readable(&missing).await);
}

#[tokio::test]
async fn test_thumbnails_render_once_and_skip_other_types() {
    let fixture = fixture(BackendKind::S3, false);
    let renderer = Arc::new(CopyRenderer::default());
    let attachments = fixture
        .attachments
        .clone()
        .with_thumbnails(fixture.dir.path().join("thumbs"), renderer.clone());

    let mut image = StoredObject::new(27, "photo.png", Utc::now());
    attachments.finalize(&mut image, &b"\x89PNG pixels"[..]).await.unwrap();

    let first = attachments.thumbnail(&image, Some(120)).await.unwrap();
    assert_eq!(
        first.file_name().unwrap().to_string_lossy(),
        format!("{}_{}_150.thumb", image.content_hash, image.size)
    );
    let second = attachments.thumbnail(&image, Some(150)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);

    let mut text = StoredObject::new(28, "notes.txt", Utc::now());
    attachments.finalize(&mut text, &b"plain"[..]).await.unwrap();
    assert_eq!(attachments.thumbnail(&text, None).await, None);
}

#[tokio::test]
async fn test_unhashed_records_get_no_thumbnail() {
    let fixture = fixture(BackendKind::S3, false);
    let renderer = Arc::new(CopyRenderer::default());
    let thumbs = fixture.dir.path().join("thumbs");
    let attachments = fixture
        .attachments
        .clone()
        .with_thumbnails(thumbs.clone(), renderer.clone());

    // A stale thumbnail named after empty content must not be served.
    std::fs::create_dir_all(&thumbs).unwrap();
    std::fs::write(thumbs.join("_0_100.thumb"), b"someone else").unwrap();

    for id in [29, 30] {
        let pending = StoredObject::new(id, "photo.png", Utc::now())
            .with_content_type("image/png")
            .with_encoded_key(format!("s3_{id}_photo.png"));
        assert_eq!(attachments.thumbnail(&pending, None).await, None);
    }
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}
