//! Tests for the local filesystem backend.

use bytes::Bytes;
use cirrus_storage::{LocalBackend, StorageBackend, StorageErrorKind};
use std::time::Duration;
use tempfile::TempDir;

fn backend(dir: &TempDir) -> LocalBackend {
    LocalBackend::new(dir.path(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_put_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    let key = storage
        .put("2024/03/abc_hello.txt", Bytes::from_static(b"Hello, world!"))
        .await
        .unwrap();
    assert_eq!(key, "2024/03/abc_hello.txt");
    assert!(temp_dir.path().join("2024/03/abc_hello.txt").exists());

    let mut sink = Vec::new();
    let copied = storage.get(&key, &mut sink).await.unwrap();
    assert_eq!(copied, 13);
    assert_eq!(sink, b"Hello, world!");
}

#[tokio::test]
async fn test_put_is_idempotent_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    for _ in 0..2 {
        storage
            .put("2024/03/abc_same.bin", Bytes::from_static(b"same bytes"))
            .await
            .unwrap();
    }

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join("2024/03"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1, "temp files must not be left behind");
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    let mut sink = Vec::new();
    let err = storage.get("2024/03/nope", &mut sink).await.unwrap_err();
    assert!(matches!(err.storage_kind(), Some(StorageErrorKind::NotFound(_))));
}

#[tokio::test]
async fn test_delete_twice() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    storage
        .put("2024/03/abc_gone.txt", Bytes::from_static(b"Delete me"))
        .await
        .unwrap();
    assert!(storage.exists("2024/03/abc_gone.txt").await.unwrap());

    storage.delete("2024/03/abc_gone.txt").await.unwrap();
    storage.delete("2024/03/abc_gone.txt").await.unwrap();
    assert!(!storage.exists("2024/03/abc_gone.txt").await.unwrap());
}

#[tokio::test]
async fn test_keys_cannot_escape_root() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    for key in ["../outside", "/etc/passwd", "", "2024/../../x"] {
        let err = storage
            .put(key, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err.storage_kind(), Some(StorageErrorKind::InvalidKey(_))));
    }
}

#[tokio::test]
async fn test_no_presigned_urls() {
    let temp_dir = TempDir::new().unwrap();
    let storage = backend(&temp_dir);

    let err = storage
        .presign("2024/03/abc_x", Duration::from_secs(300))
        .await
        .unwrap_err();
    assert!(matches!(err.storage_kind(), Some(StorageErrorKind::Unsupported(_))));
}
