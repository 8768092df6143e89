//! Fetch/Ack engine.
//!
//! Reads the durable position, returns the next batch of messages with
//! payloads attached, and advances the position under the configured
//! acknowledgement policy. An object-store read failure is not fatal: the
//! message is delivered with an empty payload and the client can retry.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use toolstream_config::AckPolicy;
use toolstream_metadata::{MetadataError, MetadataStore};
use toolstream_storage::ObjectStorage;

/// Fallback batch size when the client sends zero or a negative value.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// A message materialized for delivery.
#[derive(Debug, Clone)]
pub struct Message {
    pub sequence: u64,
    pub subject: String,
    pub headers: HashMap<String, String>,
    pub data: Bytes,
    pub timestamp_ms: i64,
}

pub struct FetchEngine {
    metadata: Arc<dyn MetadataStore>,
    payloads: Arc<dyn ObjectStorage>,
    ack_policy: AckPolicy,
}

impl FetchEngine {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        payloads: Arc<dyn ObjectStorage>,
        ack_policy: AckPolicy,
    ) -> Self {
        Self {
            metadata,
            payloads,
            ack_policy,
        }
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.ack_policy
    }

    /// Read up to `batch_size` messages after the stored position for
    /// `(durable_name, subject)`, in strictly ascending sequence order.
    ///
    /// The position is not advanced here; the caller advances it per sent
    /// message (auto policy) or on explicit acknowledgement.
    pub async fn fetch(
        &self,
        subject: &str,
        durable_name: &str,
        batch_size: i32,
    ) -> Result<Vec<Message>, MetadataError> {
        let batch_size = if batch_size <= 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size as usize
        };

        let position = self.metadata.consumer_position(durable_name, subject).await?;
        debug!(
            subject,
            durable_name,
            position,
            batch_size,
            "fetching messages"
        );

        let records = self
            .metadata
            .messages_after(subject, position, batch_size)
            .await?;

        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            let data = if record.object_name.is_empty() {
                Bytes::new()
            } else {
                match self.payloads.get(&record.object_name).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(
                            object = %record.object_name,
                            sequence = record.sequence,
                            error = %e,
                            "payload read failed, delivering empty data"
                        );
                        Bytes::new()
                    }
                }
            };

            messages.push(Message {
                sequence: record.sequence,
                subject: record.subject,
                headers: record.headers,
                data,
                timestamp_ms: record.timestamp_ms,
            });
        }

        info!(subject, durable_name, count = messages.len(), "fetched messages");
        Ok(messages)
    }

    /// Advance the durable position to `sequence`. Idempotent: sequences at
    /// or below the stored position are no-op successes.
    pub async fn acknowledge(
        &self,
        durable_name: &str,
        subject: &str,
        sequence: u64,
    ) -> Result<(), MetadataError> {
        self.metadata
            .advance_position(durable_name, subject, sequence)
            .await?;
        Ok(())
    }

    /// Latest sequence for a subject, 0 when it has no messages.
    pub async fn last_sequence(&self, subject: &str) -> Result<u64, MetadataError> {
        self.metadata.latest_sequence(subject).await
    }
}
