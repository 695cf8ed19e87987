//! Error types for Cirrus.
//!
//! This crate provides the error types shared by every Cirrus crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use cirrus_error::{CirrusResult, StorageError, StorageErrorKind};
//!
//! fn fetch_object() -> CirrusResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::NotFound("2024/03/abc_report.pdf".into())))?
//! }
//!
//! let err = fetch_object().unwrap_err();
//! assert!(err.storage_kind().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod storage;

pub use config::ConfigError;
pub use error::{CirrusError, CirrusErrorKind, CirrusResult};
pub use storage::{StorageError, StorageErrorKind};
