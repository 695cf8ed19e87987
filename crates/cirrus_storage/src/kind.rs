//! Backend kind enumeration.

use serde::{Deserialize, Serialize};

/// Storage provider that owns an object.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem under the storage root
    #[display("local")]
    Local,
    /// S3-compatible object storage
    #[display("s3")]
    S3,
    /// Google Cloud Storage
    #[display("gcs")]
    Gcs,
    /// Azure Blob Storage
    #[display("azure")]
    Azure,
}

impl BackendKind {
    /// Tag used in settings and encoded keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::Azure => "azure",
        }
    }

    /// Whether objects of this kind live with a remote provider.
    pub fn is_cloud(&self) -> bool {
        !matches!(self, BackendKind::Local)
    }

    /// Settings key naming the bucket or container, for cloud kinds.
    pub fn container_key(&self) -> Option<&'static str> {
        match self {
            BackendKind::Local => None,
            BackendKind::S3 | BackendKind::Gcs => Some("bucket"),
            BackendKind::Azure => Some("container"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "s3" => Ok(BackendKind::S3),
            "gcs" => Ok(BackendKind::Gcs),
            "azure" => Ok(BackendKind::Azure),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_matches_display() {
        for kind in BackendKind::iter() {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!(" S3 ".parse::<BackendKind>().unwrap(), BackendKind::S3);
        assert!("ftp".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_container_keys() {
        assert_eq!(BackendKind::Local.container_key(), None);
        assert_eq!(BackendKind::S3.container_key(), Some("bucket"));
        assert_eq!(BackendKind::Gcs.container_key(), Some("bucket"));
        assert_eq!(BackendKind::Azure.container_key(), Some("container"));
    }
}
