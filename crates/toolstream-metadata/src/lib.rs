//! Toolstream Metadata Store
//!
//! This crate defines the contract with the metadata store - the component
//! that knows which messages exist and tracks durable consumer progress.
//!
//! ## Purpose
//!
//! While payload bytes live in the object store, the metadata store tracks:
//! - **Messages**: sequence, subject, headers, object name, timestamp
//! - **Consumer positions**: the last sequence each durable consumer has
//!   acknowledged per subject
//! - **The global sequence counter**: allocation is atomic across
//!   concurrent publishers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────┐
//! │ Object Store │ ←──→│ Metadata Store  │ ◄── contract defined here
//! │  (payloads)  │     │   (external)    │
//! └──────────────┘     └────────┬────────┘
//!                               │ remote procedures
//!                      ┌────────┴─────────┐
//!                      │ Ingress / Egress │
//!                      └──────────────────┘
//! ```
//!
//! The store itself is an external service with its own write-ahead log and
//! snapshotting; this crate only speaks its procedure surface. Two
//! implementations are provided:
//!
//! - [`RemoteMetadataStore`]: gRPC client adapter for a deployed store
//! - [`MemoryMetadataStore`]: in-process implementation for tests and
//!   single-node development
//!
//! ## Thread Safety
//!
//! All implementations are `Send + Sync` and are shared across async tasks
//! via `Arc<dyn MetadataStore>`.

pub mod convert;
pub mod error;
pub mod memory;
pub mod remote;
pub mod types;

pub use error::{MetadataError, Result};
pub use memory::MemoryMetadataStore;
pub use remote::RemoteMetadataStore;
pub use types::*;

use async_trait::async_trait;
use std::collections::HashMap;

/// Metadata store contract - the remote procedures the broker relies on.
///
/// Sequence allocation, tuple insertion, and position updates are atomic on
/// the store side; the broker holds no locks of its own around them.
///
/// ## Error Handling
///
/// All methods return [`Result<T>`] with [`MetadataError`]. A failed call
/// carries the name of the failing operation so the server can surface it
/// as an upstream error.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Allocate the next global sequence number.
    ///
    /// The allocation is atomic across concurrent publishes and never
    /// returns the same value twice. Allocated sequences that are never
    /// committed ("burned" sequences) simply leave gaps.
    async fn next_sequence(&self) -> Result<u64>;

    /// Insert a message tuple.
    ///
    /// The tuple becomes visible to readers atomically. Publishers must
    /// only call this after the referenced object is durable.
    async fn insert_message(&self, record: MessageRecord) -> Result<()>;

    /// Read a single message tuple by sequence, `None` when absent.
    async fn get_message(&self, sequence: u64) -> Result<Option<MessageRecord>>;

    /// Read up to `limit` tuples of `subject` with sequence strictly greater
    /// than `after_sequence`, in ascending sequence order.
    async fn messages_after(
        &self,
        subject: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>>;

    /// Latest sequence committed for a subject, 0 when the subject has no
    /// messages.
    async fn latest_sequence(&self, subject: &str) -> Result<u64>;

    /// Stored position for a durable consumer, 0 when absent.
    ///
    /// Positions are created lazily; a consumer that has never fetched
    /// starts at 0 and sees the subject from the beginning.
    async fn consumer_position(&self, durable_name: &str, subject: &str) -> Result<u64>;

    /// Atomically advance a durable consumer position to `sequence` if it is
    /// greater than the stored value.
    ///
    /// Returns whether the stored value changed. Advancing to a sequence at
    /// or below the stored position is a no-op, which makes acknowledgement
    /// idempotent.
    async fn advance_position(
        &self,
        durable_name: &str,
        subject: &str,
        sequence: u64,
    ) -> Result<bool>;

    /// Atomically delete message tuples older than the per-subject cutoff.
    ///
    /// `subject_cutoffs_ms` overrides `default_cutoff_ms` for the subjects
    /// it names. The store removes the tuples before returning, so a reader
    /// can never observe a tuple whose object the sweeper is about to
    /// delete.
    async fn delete_expired(
        &self,
        default_cutoff_ms: i64,
        subject_cutoffs_ms: &HashMap<String, i64>,
    ) -> Result<ExpiredBatch>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Release the underlying connection.
    ///
    /// Close happens-after all in-flight calls; afterwards every call fails
    /// with [`MetadataError::Closed`].
    async fn close(&self) -> Result<()>;
}
