//! Toolstream Payload Storage
//!
//! Payload bytes live in a single object store bucket, keyed by
//! `{subject}_{sequence}`. This crate wraps the `object_store` crate behind
//! the small surface the broker needs (put, get, delete, bucket check) and
//! memoizes the bucket check so only the first publish pays for it.
//!
//! ## Backends
//!
//! - **S3 / MinIO** via [`PayloadStore::s3`]
//! - **Local filesystem** via [`PayloadStore::local`] (development)
//! - **In-memory** via [`PayloadStore::in_memory`] (tests)

pub mod error;
pub mod payload;

pub use error::{Result, StorageError};
pub use payload::{ObjectStorage, PayloadStore, S3Config};

/// Object store key for a message payload.
///
/// The format is shared verbatim between the publish (upload) and fetch
/// (download) paths and must never change shape: the subject passes through
/// unmodified and the sequence is rendered in decimal.
pub fn object_name(subject: &str, sequence: u64) -> String {
    format!("{subject}_{sequence}")
}
