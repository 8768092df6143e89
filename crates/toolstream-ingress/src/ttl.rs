//! TTL sweeper background task.
//!
//! Once per tick the sweeper asks the metadata store to range-delete
//! everything older than the per-subject retention, then deletes the
//! referenced objects. Metadata goes first: a tuple must never outlive its
//! object from a subscriber's point of view, while an orphan object merely
//! waits for the bucket lifecycle rule.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use toolstream_config::TtlConfig;
use toolstream_metadata::{MetadataError, MetadataStore};
use toolstream_storage::ObjectStorage;

/// Counters from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub metadata_deleted: u64,
    pub objects_deleted: u64,
    pub object_failures: u64,
}

/// Joint metadata + object expiry task.
pub struct TtlSweeper {
    metadata: Arc<dyn MetadataStore>,
    payloads: Arc<dyn ObjectStorage>,
    config: TtlConfig,
}

impl TtlSweeper {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        payloads: Arc<dyn ObjectStorage>,
        config: TtlConfig,
    ) -> Self {
        Self {
            metadata,
            payloads,
            config,
        }
    }

    /// Start the background task. The first sweep runs immediately, then
    /// once per cadence until the shutdown signal fires; an in-flight sweep
    /// is allowed to finish.
    pub fn start(self: Arc<Self>, shutdown_rx: oneshot::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.config.enabled {
                info!("ttl sweeper disabled");
                return;
            }

            let cadence = self.config.sweep_interval();
            info!(
                retention_secs = self.config.default_secs,
                cadence_secs = cadence.as_secs(),
                overrides = self.config.channels.len(),
                "ttl sweeper started"
            );

            let mut ticker = interval(cadence);
            let mut shutdown_rx = shutdown_rx;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            error!(error = %e, "ttl sweep failed");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("ttl sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Run one sweep. Public so deployments and tests can trigger it
    /// outside the background cadence.
    pub async fn sweep_once(&self) -> Result<SweepStats, MetadataError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let default_cutoff_ms = now_ms - self.config.default_retention().as_millis() as i64;
        let subject_cutoffs_ms: HashMap<String, i64> = self
            .config
            .overrides()
            .into_iter()
            .map(|(subject, secs)| (subject, now_ms - (secs as i64) * 1000))
            .collect();

        let batch = self
            .metadata
            .delete_expired(default_cutoff_ms, &subject_cutoffs_ms)
            .await?;

        if batch.deleted_count == 0 {
            debug!("no expired messages");
            return Ok(SweepStats::default());
        }

        let mut stats = SweepStats {
            metadata_deleted: batch.deleted_count,
            ..Default::default()
        };

        for expired in &batch.deleted {
            if expired.object_name.is_empty() {
                continue;
            }
            match self.payloads.delete(&expired.object_name).await {
                Ok(()) => stats.objects_deleted += 1,
                Err(e) => {
                    warn!(
                        object = %expired.object_name,
                        sequence = expired.sequence,
                        subject = %expired.subject,
                        error = %e,
                        "failed to delete expired object"
                    );
                    stats.object_failures += 1;
                }
            }
        }

        info!(
            metadata_deleted = stats.metadata_deleted,
            objects_deleted = stats.objects_deleted,
            object_failures = stats.object_failures,
            "ttl sweep completed"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap as StdHashMap;
    use toolstream_metadata::{MemoryMetadataStore, MessageRecord};
    use toolstream_storage::{object_name, PayloadStore};

    async fn seed(
        metadata: &MemoryMetadataStore,
        payloads: &PayloadStore,
        subject: &str,
        sequence: u64,
        age_ms: i64,
    ) {
        let name = object_name(subject, sequence);
        payloads
            .put(&name, Bytes::from(format!("payload-{sequence}")))
            .await
            .unwrap();
        metadata
            .insert_message(MessageRecord {
                sequence,
                subject: subject.to_string(),
                headers: StdHashMap::new(),
                object_name: name,
                timestamp_ms: chrono::Utc::now().timestamp_millis() - age_ms,
            })
            .await
            .unwrap();
    }

    fn sweeper(
        metadata: Arc<MemoryMetadataStore>,
        payloads: Arc<PayloadStore>,
        default_secs: u64,
        channels: Vec<(&str, u64)>,
    ) -> TtlSweeper {
        let config = TtlConfig {
            enabled: true,
            default_secs,
            sweep_interval_secs: 0,
            channels: channels
                .into_iter()
                .map(|(channel, secs)| toolstream_config::ChannelTtl {
                    channel: channel.to_string(),
                    secs,
                })
                .collect(),
        };
        TtlSweeper::new(metadata, payloads, config)
    }

    #[tokio::test]
    async fn sweep_deletes_metadata_and_objects_together() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let payloads = Arc::new(PayloadStore::in_memory());

        // Two messages well past a 1-second retention, one fresh.
        seed(&metadata, &payloads, "s", 1, 60_000).await;
        seed(&metadata, &payloads, "s", 2, 60_000).await;
        seed(&metadata, &payloads, "s", 3, 0).await;

        let sweeper = sweeper(metadata.clone(), payloads.clone(), 1, vec![]);
        let stats = sweeper.sweep_once().await.unwrap();

        assert_eq!(stats.metadata_deleted, 2);
        assert_eq!(stats.objects_deleted, 2);
        assert_eq!(stats.object_failures, 0);

        assert!(metadata.get_message(1).await.unwrap().is_none());
        assert!(metadata.get_message(2).await.unwrap().is_none());
        assert!(metadata.get_message(3).await.unwrap().is_some());
        assert!(payloads.get("s_1").await.is_err());
        assert!(payloads.get("s_2").await.is_err());
        assert!(payloads.get("s_3").await.is_ok());
    }

    #[tokio::test]
    async fn per_subject_retention_overrides_the_default() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let payloads = Arc::new(PayloadStore::in_memory());

        // Both are 30 seconds old. The default retention (1h) keeps "slow";
        // the 10-second override expires "fast".
        seed(&metadata, &payloads, "fast", 1, 30_000).await;
        seed(&metadata, &payloads, "slow", 2, 30_000).await;

        let sweeper = sweeper(
            metadata.clone(),
            payloads.clone(),
            3600,
            vec![("fast", 10)],
        );
        let stats = sweeper.sweep_once().await.unwrap();

        assert_eq!(stats.metadata_deleted, 1);
        assert!(metadata.get_message(1).await.unwrap().is_none());
        assert!(metadata.get_message(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_object_names_are_skipped() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let payloads = Arc::new(PayloadStore::in_memory());

        metadata
            .insert_message(MessageRecord {
                sequence: 1,
                subject: "s".to_string(),
                headers: StdHashMap::new(),
                object_name: String::new(),
                timestamp_ms: 0,
            })
            .await
            .unwrap();

        let sweeper = sweeper(metadata.clone(), payloads.clone(), 1, vec![]);
        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats.metadata_deleted, 1);
        assert_eq!(stats.objects_deleted, 0);
        assert_eq!(stats.object_failures, 0);
    }

    #[tokio::test]
    async fn missing_objects_are_counted_not_fatal() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let payloads = Arc::new(PayloadStore::in_memory());

        // Metadata references an object that was already removed.
        metadata
            .insert_message(MessageRecord {
                sequence: 1,
                subject: "s".to_string(),
                headers: StdHashMap::new(),
                object_name: "s_1".to_string(),
                timestamp_ms: 0,
            })
            .await
            .unwrap();

        let sweeper = sweeper(metadata.clone(), payloads.clone(), 1, vec![]);
        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats.metadata_deleted, 1);
        assert_eq!(stats.object_failures, 1);
    }
}
