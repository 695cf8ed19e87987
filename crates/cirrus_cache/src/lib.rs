//! Local retrieval cache for cloud-stored attachments.
//!
//! Cloud objects are downloaded once into a per-record cache directory and
//! served from disk afterwards. Local objects resolve straight to their
//! storage path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;

pub use cache::{Resolution, RetrievalCache};
pub use config::{RetrievalCacheConfig, RetrievalCacheConfigBuilder};
