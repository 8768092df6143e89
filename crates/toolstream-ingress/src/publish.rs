//! Publish coordination.
//!
//! The order of operations is fixed and load-bearing:
//!
//! 1. Allocate a sequence number (atomic on the store side)
//! 2. Upload the payload, keyed `{subject}_{sequence}`
//! 3. Commit the metadata tuple
//!
//! Uploading before the commit is the only ordering under which a
//! subscriber can never be notified of a sequence whose payload is still
//! absent. An upload failure burns the allocated sequence (gaps are legal);
//! a commit failure leaves an orphan object which is deleted best-effort
//! here and reclaimed by the retention lifecycle otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info, warn};

use toolstream_metadata::{MessageRecord, MetadataError, MetadataStore};
use toolstream_storage::{object_name, ObjectStorage, StorageError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("failed to allocate sequence: {0}")]
    Sequence(#[source] MetadataError),

    #[error("failed to upload payload for sequence {sequence}: {source}")]
    Upload {
        sequence: u64,
        #[source]
        source: StorageError,
    },

    #[error("failed to commit metadata for sequence {sequence}: {source}")]
    Commit {
        sequence: u64,
        #[source]
        source: MetadataError,
    },

    #[error("metadata store unavailable: {0}")]
    MetadataUnavailable(#[source] MetadataError),

    #[error("object store unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),
}

impl PublishError {
    /// Sequence allocated before the failure, when one was.
    pub fn sequence(&self) -> u64 {
        match self {
            PublishError::Upload { sequence, .. } | PublishError::Commit { sequence, .. } => {
                *sequence
            }
            _ => 0,
        }
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub sequence: u64,
    /// Empty when the payload was empty and no object was uploaded.
    pub object_name: String,
}

/// Executes the three-step publish protocol.
pub struct PublishCoordinator {
    metadata: Arc<dyn MetadataStore>,
    payloads: Arc<dyn ObjectStorage>,
}

impl PublishCoordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>, payloads: Arc<dyn ObjectStorage>) -> Self {
        Self { metadata, payloads }
    }

    pub async fn publish(
        &self,
        subject: &str,
        data: Bytes,
        headers: HashMap<String, String>,
    ) -> Result<PublishReceipt, PublishError> {
        if subject.is_empty() {
            return Err(PublishError::EmptySubject);
        }

        info!(subject, data_size = data.len(), "publishing message");

        let sequence = self
            .metadata
            .next_sequence()
            .await
            .map_err(PublishError::Sequence)?;

        let object_name = if data.is_empty() {
            String::new()
        } else {
            let name = object_name(subject, sequence);
            if let Err(source) = self.payloads.put(&name, data).await {
                // The sequence stays burned; readers never see it because
                // no tuple will reference it.
                error!(subject, sequence, object = %name, error = %source, "payload upload failed");
                return Err(PublishError::Upload { sequence, source });
            }
            name
        };

        let record = MessageRecord {
            sequence,
            subject: subject.to_string(),
            headers,
            object_name: object_name.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };

        if let Err(source) = self.metadata.insert_message(record).await {
            error!(subject, sequence, error = %source, "metadata commit failed");
            if !object_name.is_empty() {
                // Best-effort orphan removal; the lifecycle rule is the
                // safety net if this fails too.
                if let Err(e) = self.payloads.delete(&object_name).await {
                    warn!(object = %object_name, error = %e, "orphan object left behind");
                }
            }
            return Err(PublishError::Commit { sequence, source });
        }

        info!(subject, sequence, object_name = %object_name, "message published");

        Ok(PublishReceipt {
            sequence,
            object_name,
        })
    }

    /// Verify both dependencies are reachable.
    pub async fn health_check(&self) -> Result<(), PublishError> {
        self.metadata
            .ping()
            .await
            .map_err(PublishError::MetadataUnavailable)?;
        self.payloads
            .ensure_bucket()
            .await
            .map_err(PublishError::StorageUnavailable)?;
        Ok(())
    }
}
