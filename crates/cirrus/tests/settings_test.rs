//! Tests for settings files and the registry they build.

use cirrus::{BackendKind, CirrusSettings, StorageErrorKind};
use std::io::Write;

#[tokio::test]
async fn test_settings_file_builds_registry() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
storage = "azure"

[local]
root = "/srv/cirrus/files"

[timeouts]
request_secs = 5

[azure]
account_name = "cirrusacct"
"#
    )
    .unwrap();

    let settings = CirrusSettings::from_file(file.path()).unwrap();
    assert_eq!(*settings.storage(), BackendKind::Azure);
    assert_eq!(*settings.timeouts().request_secs(), 5);
    assert_eq!(*settings.timeouts().connect_secs(), 10);

    let registry = settings.registry();
    assert_eq!(registry.selected(), BackendKind::Azure);
    assert_eq!(registry.local_root(), std::path::Path::new("/srv/cirrus/files"));

    // The block exists but lacks its container.
    assert!(registry.get_config(BackendKind::Azure).is_ok());
    let err = registry.get_client(BackendKind::Azure).await.unwrap_err();
    assert!(matches!(
        err.storage_kind(),
        Some(StorageErrorKind::Configuration(_))
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let err = CirrusSettings::from_file("/nonexistent/cirrus.toml").unwrap_err();
    assert!(err.storage_kind().is_none());
    assert!(err.to_string().contains("Configuration Error"));
}
