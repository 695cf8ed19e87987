//! Retrieval cache configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the retrieval cache.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_", into)]
#[builder(setter(into))]
pub struct RetrievalCacheConfig {
    /// Directory holding one subdirectory per cached record
    #[serde(default = "default_root")]
    #[builder(default = "default_root()")]
    root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("tmp/cirrus_cache")
}

impl Default for RetrievalCacheConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl RetrievalCacheConfig {
    /// Configuration caching under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_root() {
        let config = RetrievalCacheConfigBuilder::default().build().unwrap();
        assert_eq!(config, RetrievalCacheConfig::default());

        let config = RetrievalCacheConfigBuilder::default()
            .root("/var/cache/cirrus")
            .build()
            .unwrap();
        assert_eq!(config.root(), &PathBuf::from("/var/cache/cirrus"));
    }
}
