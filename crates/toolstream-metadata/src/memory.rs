//! In-memory metadata store.
//!
//! Implements the full [`MetadataStore`] contract with the same edge-case
//! semantics as a deployed store: atomic sequence allocation, strictly
//! ascending reads, monotonic position updates, and joint expiry reporting.
//! Used by the test suites and for single-process development.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{MetadataError, Result};
use crate::types::{ExpiredBatch, ExpiredMessage, MessageRecord};
use crate::MetadataStore;

#[derive(Default)]
struct Inner {
    next_sequence: u64,
    // Keyed by sequence; BTreeMap iteration gives ascending order for free.
    messages: BTreeMap<u64, MessageRecord>,
    positions: HashMap<(String, String), u64>,
    closed: bool,
}

/// In-process implementation of the metadata store contract.
#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored message tuples.
    pub fn message_count(&self) -> usize {
        self.inner.read().messages.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn next_sequence(&self) -> Result<u64> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        inner.next_sequence += 1;
        Ok(inner.next_sequence)
    }

    async fn insert_message(&self, record: MessageRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        inner.messages.insert(record.sequence, record);
        Ok(())
    }

    async fn get_message(&self, sequence: u64) -> Result<Option<MessageRecord>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        Ok(inner.messages.get(&sequence).cloned())
    }

    async fn messages_after(
        &self,
        subject: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        Ok(inner
            .messages
            .range(after_sequence.saturating_add(1)..)
            .map(|(_, record)| record)
            .filter(|record| record.subject == subject)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_sequence(&self, subject: &str) -> Result<u64> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        Ok(inner
            .messages
            .values()
            .rev()
            .find(|record| record.subject == subject)
            .map(|record| record.sequence)
            .unwrap_or(0))
    }

    async fn consumer_position(&self, durable_name: &str, subject: &str) -> Result<u64> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        Ok(inner
            .positions
            .get(&(durable_name.to_string(), subject.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn advance_position(
        &self,
        durable_name: &str,
        subject: &str,
        sequence: u64,
    ) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        let key = (durable_name.to_string(), subject.to_string());
        let stored = inner.positions.entry(key).or_insert(0);
        if sequence > *stored {
            *stored = sequence;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete_expired(
        &self,
        default_cutoff_ms: i64,
        subject_cutoffs_ms: &HashMap<String, i64>,
    ) -> Result<ExpiredBatch> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(MetadataError::Closed);
        }
        let expired: Vec<u64> = inner
            .messages
            .values()
            .filter(|record| {
                let cutoff = subject_cutoffs_ms
                    .get(&record.subject)
                    .copied()
                    .unwrap_or(default_cutoff_ms);
                record.timestamp_ms < cutoff
            })
            .map(|record| record.sequence)
            .collect();

        let mut deleted = Vec::with_capacity(expired.len());
        for sequence in expired {
            if let Some(record) = inner.messages.remove(&sequence) {
                deleted.push(ExpiredMessage {
                    sequence: record.sequence,
                    subject: record.subject,
                    object_name: record.object_name,
                });
            }
        }

        Ok(ExpiredBatch {
            deleted_count: deleted.len() as u64,
            deleted,
        })
    }

    async fn ping(&self) -> Result<()> {
        if self.inner.read().closed {
            return Err(MetadataError::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.write().closed = true;
        Ok(())
    }
}
