//! Encoded keys: backend routing carried in the stored filename.
//!
//! A cloud object is recorded as `<kind>_<basename>`, where the basename is
//! the final component of its physical key. The date-partitioned directory is
//! rebuilt from the record's creation time, so decoding never needs I/O.
//! Anything that does not match the cloud pattern is a local filename.
//!
//! ```text
//! physical key  attachments/2024/03/9f2c..e1_report.pdf
//! encoded key   s3_9f2c..e1_report.pdf
//! ```

use crate::BackendKind;
use chrono::{DateTime, Datelike, Utc};
use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

static CLOUD_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(s3|gcs|azure)_[^_]+_").expect("Valid cloud key regex"));

static RESERVED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(s3|gcs|azure)_").expect("Valid reserved prefix regex"));

/// Backend kind and basename recovered from an encoded key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_getters::Getters)]
pub struct DecodedKey {
    kind: BackendKind,
    basename: String,
}

impl DecodedKey {
    /// Rebuild the physical key under `prefix` for an object created at `created_at`.
    pub fn physical_key(&self, prefix: &str, created_at: DateTime<Utc>) -> String {
        KeyCodec::physical_key(prefix, created_at, &self.basename)
    }
}

/// Encodes and decodes the `(backend kind, physical key)` pair.
pub struct KeyCodec;

impl KeyCodec {
    /// Encode a physical key owned by `kind`.
    ///
    /// Cloud kinds produce `<kind>_<basename>`; local objects keep the bare basename.
    pub fn encode(kind: BackendKind, physical_key: &str) -> String {
        let basename = Self::basename(physical_key);
        if kind.is_cloud() {
            format!("{}_{}", kind.as_str(), basename)
        } else {
            basename.to_string()
        }
    }

    /// Decode an encoded key without any lookup.
    pub fn decode(encoded: &str) -> DecodedKey {
        if Self::is_cloud(encoded)
            && let Some((tag, basename)) = encoded.split_once('_')
            && let Ok(kind) = tag.parse::<BackendKind>()
        {
            return DecodedKey {
                kind,
                basename: basename.to_string(),
            };
        }

        DecodedKey {
            kind: BackendKind::Local,
            basename: encoded.to_string(),
        }
    }

    /// Whether the string is a cloud-tagged encoded key.
    ///
    /// Requires the tag and at least one more underscore-delimited segment, so a
    /// local file that merely starts with `s3_` is not mistaken for a cloud key.
    /// Keys that are not a single file name are never cloud keys.
    pub fn is_cloud(encoded: &str) -> bool {
        CLOUD_KEY.is_match(encoded) && Self::is_plain_name(encoded)
    }

    /// Whether `name` is exactly one normal path component.
    pub fn is_plain_name(name: &str) -> bool {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return false;
        }
        let mut components = Path::new(name).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }

    /// Whether a basename starts with a reserved `<kind>_` tag.
    pub fn has_reserved_prefix(basename: &str) -> bool {
        RESERVED_PREFIX.is_match(basename)
    }

    /// Check that a basename can be stored under `kind` and decoded back unambiguously.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` when the basename is empty, contains a path separator,
    /// starts with a reserved tag, or would not be recognised as a cloud key once
    /// encoded for a cloud kind.
    pub fn validate_basename(kind: BackendKind, basename: &str) -> CirrusResult<()> {
        let reject = |reason: &str| -> CirrusResult<()> {
            Err(StorageError::new(StorageErrorKind::InvalidKey(format!(
                "{}: {}",
                basename, reason
            )))
            .into())
        };

        if basename.is_empty() {
            return reject("basename is empty");
        }
        if basename.contains('/') || basename.contains('\\') {
            return reject("basename contains a path separator");
        }
        if basename == "." || basename == ".." {
            return reject("basename is a relative path component");
        }
        if Self::has_reserved_prefix(basename) {
            return reject("basename starts with a reserved backend tag");
        }
        if kind.is_cloud() && !Self::is_cloud(&Self::encode(kind, basename)) {
            return reject("cloud basenames must have the form <token>_<name>");
        }
        Ok(())
    }

    /// `YYYY/MM` partition for an object created at `created_at`.
    pub fn date_partition(created_at: DateTime<Utc>) -> String {
        format!("{:04}/{:02}", created_at.year(), created_at.month())
    }

    /// Join `prefix`, the date partition and `basename` into a physical key.
    pub fn physical_key(prefix: &str, created_at: DateTime<Utc>, basename: &str) -> String {
        let prefix = prefix.trim_matches('/');
        let partition = Self::date_partition(created_at);
        if prefix.is_empty() {
            format!("{}/{}", partition, basename)
        } else {
            format!("{}/{}/{}", prefix, partition, basename)
        }
    }

    /// Final path component of a physical key.
    pub fn basename(physical_key: &str) -> &str {
        physical_key
            .rsplit('/')
            .next()
            .unwrap_or(physical_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    fn march_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_round_trip_every_kind() {
        let created_at = march_2024();
        for kind in BackendKind::iter() {
            let prefix = if kind.is_cloud() { "redmine/files" } else { "" };
            let physical = KeyCodec::physical_key(prefix, created_at, "5d41402abc_hello.txt");

            let decoded = KeyCodec::decode(&KeyCodec::encode(kind, &physical));
            assert_eq!(*decoded.kind(), kind);
            assert_eq!(decoded.physical_key(prefix, created_at), physical);
        }
    }

    #[test]
    fn test_cloud_detection() {
        assert!(KeyCodec::is_cloud(&KeyCodec::encode(
            BackendKind::S3,
            "a/2024/03/abc_x.png"
        )));
        assert!(KeyCodec::is_cloud("gcs_abc_x.png"));
        assert!(KeyCodec::is_cloud("azure_abc_x.png"));

        assert!(!KeyCodec::is_cloud("240315103000_report.pdf"));
        assert!(!KeyCodec::is_cloud("s3_report.pdf"));
        assert!(!KeyCodec::is_cloud("s3__report.pdf"));
        assert!(!KeyCodec::is_cloud("ftp_abc_x.png"));
    }

    #[test]
    fn test_local_lookalike_decodes_as_local() {
        let decoded = KeyCodec::decode("s3_report.pdf");
        assert_eq!(*decoded.kind(), BackendKind::Local);
        assert_eq!(decoded.basename(), "s3_report.pdf");
    }

    #[test]
    fn test_keys_with_path_segments_are_not_cloud() {
        for key in ["s3_x_/../../../secret.txt", "gcs_a_b/c.png", "azure_a_..\\x"] {
            assert!(!KeyCodec::is_cloud(key), "{key}");
            assert_eq!(*KeyCodec::decode(key).kind(), BackendKind::Local);
        }

        assert!(KeyCodec::is_plain_name("abc_report.pdf"));
        for name in ["", ".", "..", "a/b", "a\\b", "/etc"] {
            assert!(!KeyCodec::is_plain_name(name), "{name}");
        }
    }

    #[test]
    fn test_physical_key_trims_prefix_slashes() {
        assert_eq!(
            KeyCodec::physical_key("/attachments/", march_2024(), "a_b"),
            "attachments/2024/03/a_b"
        );
        assert_eq!(KeyCodec::physical_key("", march_2024(), "a_b"), "2024/03/a_b");
    }

    #[test]
    fn test_validate_basename() {
        assert!(KeyCodec::validate_basename(BackendKind::S3, "abc_report.pdf").is_ok());
        assert!(KeyCodec::validate_basename(BackendKind::Local, "report.pdf").is_ok());

        for bad in ["s3_evil_thing", "gcs_x", "azure_y_z", "", "a/b_c", ".."] {
            let err = KeyCodec::validate_basename(BackendKind::Local, bad).unwrap_err();
            assert!(matches!(
                err.storage_kind(),
                Some(StorageErrorKind::InvalidKey(_))
            ));
        }

        // A cloud basename without a token segment would decode as local.
        assert!(KeyCodec::validate_basename(BackendKind::Azure, "report.pdf").is_err());
    }
}
