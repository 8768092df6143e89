//! Subscription polling.
//!
//! One poller task runs per active subscription. It tracks a high-water
//! mark and emits a notification whenever the latest sequence for the
//! subject advances past it. Notifications are hints, not deliveries: ten
//! messages between two polls coalesce into one notification carrying the
//! highest sequence. The poller never touches the durable position; only
//! the fetch path advances it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use toolstream_metadata::{MetadataError, MetadataStore};

/// A hint that at least one new message exists at or below `sequence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub sequence: u64,
}

/// Polls the metadata store on behalf of active subscriptions.
pub struct SubscriptionPoller {
    metadata: Arc<dyn MetadataStore>,
    poll_interval: Duration,
}

impl SubscriptionPoller {
    pub fn new(metadata: Arc<dyn MetadataStore>, poll_interval: Duration) -> Self {
        Self {
            metadata,
            poll_interval,
        }
    }

    /// Resolve the starting high-water mark for a subscription.
    ///
    /// The durable position is authoritative as a lower bound; a supplied
    /// `start_sequence` can only move the mark forward, never backward.
    pub async fn initial_high_water(
        &self,
        subject: &str,
        durable_name: &str,
        start_sequence: Option<u64>,
    ) -> Result<u64, MetadataError> {
        let mut high_water = self.metadata.consumer_position(durable_name, subject).await?;
        if let Some(start) = start_sequence {
            if start > high_water {
                high_water = start;
            }
        }
        Ok(high_water)
    }

    /// Run the poll loop until the subscriber goes away.
    ///
    /// The first check happens immediately so a subscriber with backlog is
    /// notified without waiting a full tick. Transient store errors are
    /// logged and the loop continues; a dropped receiver ends it.
    pub async fn run(&self, subject: String, mut high_water: u64, tx: mpsc::Sender<Notification>) {
        info!(subject = %subject, high_water, "subscription started");

        let mut ticker = interval(self.poll_interval);
        // The first tick completes immediately; the check below is the
        // immediate one.
        ticker.tick().await;

        loop {
            match self.metadata.latest_sequence(&subject).await {
                Ok(latest) if latest > high_water => {
                    let notification = Notification {
                        subject: subject.clone(),
                        sequence: latest,
                    };
                    // Bounded channel: a slow subscriber backpressures the
                    // poller here until it drains or disconnects.
                    if tx.send(notification).await.is_err() {
                        info!(subject = %subject, "subscription cancelled");
                        return;
                    }
                    debug!(subject = %subject, sequence = latest, "sent notification");
                    high_water = latest;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(subject = %subject, error = %e, "subscription poll failed");
                }
            }

            tokio::select! {
                _ = tx.closed() => {
                    info!(subject = %subject, "subscription cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }
        }
    }
}
