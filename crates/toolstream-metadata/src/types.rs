//! Metadata record types.
//!
//! ## Design Decisions
//!
//! - Timestamps are i64 milliseconds since epoch
//! - Sequences are u64 and globally monotonic with gaps permitted
//! - Headers are `HashMap<String, String>`; insertion order is irrelevant
//! - Payload bytes are never part of a stored record; they are attached on
//!   the read path from the object store

use std::collections::HashMap;

/// A message metadata tuple as stored in the metadata store.
///
/// `object_name` is empty when the message was published with an empty
/// payload; in that case no object exists for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub sequence: u64,
    pub subject: String,
    pub headers: HashMap<String, String>,
    pub object_name: String,
    pub timestamp_ms: i64,
}

/// Identity of a message removed by a retention sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredMessage {
    pub sequence: u64,
    pub subject: String,
    pub object_name: String,
}

/// Result of one retention range-delete.
#[derive(Debug, Clone, Default)]
pub struct ExpiredBatch {
    /// Accurate count of removed tuples as reported by the store.
    pub deleted_count: u64,
    /// The removed tuples, for joint object deletion.
    pub deleted: Vec<ExpiredMessage>,
}
