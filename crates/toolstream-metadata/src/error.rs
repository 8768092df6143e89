//! Metadata error types.
//!
//! All metadata operations return `Result<T>` which is aliased to
//! `Result<T, MetadataError>`, allowing clean propagation with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store connection failed: {0}")]
    Connection(String),

    #[error("metadata store call {operation} failed: {status}")]
    Call {
        operation: &'static str,
        status: tonic::Status,
    },

    #[error("metadata store is closed")]
    Closed,

    #[error("invalid metadata store address: {0}")]
    InvalidAddress(String),
}

impl MetadataError {
    pub(crate) fn call(operation: &'static str, status: tonic::Status) -> Self {
        MetadataError::Call { operation, status }
    }
}
