//! Tests for backend registry memoization and configuration.

use cirrus_storage::{BackendConfig, BackendKind, BackendRegistry, StorageBackend, StorageErrorKind};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_builds_one_client() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(BackendRegistry::builder(temp_dir.path()).build());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_client(BackendKind::Local).await.unwrap() })
        })
        .collect();

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap());
    }
    for client in &clients[1..] {
        assert!(Arc::ptr_eq(&clients[0], client));
    }
}

#[tokio::test]
async fn test_missing_config_is_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let registry = BackendRegistry::builder(temp_dir.path()).build();

    for kind in [BackendKind::S3, BackendKind::Gcs, BackendKind::Azure] {
        let err = registry.get_config(kind).unwrap_err();
        assert!(matches!(err.storage_kind(), Some(StorageErrorKind::Configuration(_))));

        let err = registry.get_client(kind).await.unwrap_err();
        assert!(matches!(err.storage_kind(), Some(StorageErrorKind::Configuration(_))));
    }
}

#[tokio::test]
async fn test_incomplete_config_fails_before_network() {
    let temp_dir = TempDir::new().unwrap();
    let registry = BackendRegistry::builder(temp_dir.path())
        .config(BackendConfig::new(BackendKind::S3).with("region", "us-east-1"))
        .build();

    assert!(registry.get_config(BackendKind::S3).is_ok());
    let err = registry.get_client(BackendKind::S3).await.unwrap_err();
    assert!(matches!(err.storage_kind(), Some(StorageErrorKind::Configuration(_))));
}

#[tokio::test]
async fn test_local_is_always_configured() {
    let temp_dir = TempDir::new().unwrap();
    let registry = BackendRegistry::builder(temp_dir.path().join("files")).build();

    assert_eq!(registry.selected(), BackendKind::Local);
    let config = registry.get_config(BackendKind::Local).unwrap();
    assert_eq!(config.path_prefix(), "");

    let client = registry.get_client(BackendKind::Local).await.unwrap();
    assert_eq!(client.kind(), BackendKind::Local);
    assert!(temp_dir.path().join("files").is_dir());
}
