//! End-to-end broker flow tests.
//!
//! These exercise the publish → notify → fetch → ack cycle through the real
//! gRPC handlers, backed by the in-memory metadata and payload stores:
//!
//! 1. Ingress runs the three-step publish protocol
//! 2. The subscription poller emits coalesced notifications
//! 3. Fetch attaches payloads and advances the durable position
//! 4. AckMessage advances positions explicitly

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_stream::StreamExt;
use tonic::Request;

use toolstream_config::AckPolicy;
use toolstream_egress::{EgressHandler, FetchEngine, SubscriptionPoller};
use toolstream_ingress::{IngressHandler, PublishCoordinator};
use toolstream_metadata::{MemoryMetadataStore, MetadataStore};
use toolstream_proto::toolstream::egress_service_server::EgressService;
use toolstream_proto::toolstream::ingress_service_server::IngressService;
use toolstream_proto::toolstream::{
    AckMessageRequest, FetchRequest, Message, PublishRequest, SubscribeRequest,
};
use toolstream_storage::PayloadStore;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Broker {
    metadata: Arc<MemoryMetadataStore>,
    ingress: IngressHandler,
    egress: EgressHandler,
}

fn broker(ack_policy: AckPolicy) -> Broker {
    let metadata = Arc::new(MemoryMetadataStore::new());
    let payloads = Arc::new(PayloadStore::in_memory());

    let coordinator = Arc::new(PublishCoordinator::new(metadata.clone(), payloads.clone()));
    let ingress = IngressHandler::new(coordinator);

    let poller = Arc::new(SubscriptionPoller::new(metadata.clone(), POLL_INTERVAL));
    let engine = Arc::new(FetchEngine::new(metadata.clone(), payloads, ack_policy));
    let egress = EgressHandler::new(poller, engine);

    Broker {
        metadata,
        ingress,
        egress,
    }
}

async fn publish(broker: &Broker, subject: &str, data: &[u8], headers: &[(&str, &str)]) -> u64 {
    let response = broker
        .ingress
        .publish(Request::new(PublishRequest {
            subject: subject.to_string(),
            data: data.to_vec(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status_code, 0, "{}", response.error_message);
    response.sequence
}

async fn fetch(broker: &Broker, subject: &str, durable: &str, batch_size: i32) -> Vec<Message> {
    let mut stream = broker
        .egress
        .fetch(Request::new(FetchRequest {
            subject: subject.to_string(),
            durable_name: durable.to_string(),
            batch_size,
        }))
        .await
        .unwrap()
        .into_inner();

    let mut messages = Vec::new();
    while let Some(item) = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("fetch stream stalled")
    {
        messages.push(item.unwrap());
    }
    messages
}

#[tokio::test]
async fn publish_then_fetch_roundtrip() {
    let broker = broker(AckPolicy::Auto);

    let sequence = publish(&broker, "orders", b"Hello", &[("ct", "text/plain")]).await;
    assert_eq!(sequence, 1);

    let messages = fetch(&broker, "orders", "c1", 10).await;
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.sequence, 1);
    assert_eq!(message.subject, "orders");
    assert_eq!(message.data, b"Hello");
    assert_eq!(message.headers["ct"], "text/plain");
    assert_eq!(message.headers["data-size"], "5");
    assert!(message.timestamp.is_some());

    // Auto-ack advanced the durable position.
    assert_eq!(
        broker.metadata.consumer_position("c1", "orders").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn batched_fetches_walk_the_subject_without_overlap() {
    let broker = broker(AckPolicy::Auto);
    for i in 0..3 {
        publish(&broker, "a", format!("m{i}").as_bytes(), &[]).await;
    }

    let first = fetch(&broker, "a", "c", 2).await;
    assert_eq!(
        first.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let second = fetch(&broker, "a", "c", 2).await;
    assert_eq!(
        second.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![3]
    );

    assert!(fetch(&broker, "a", "c", 2).await.is_empty());
}

#[tokio::test]
async fn empty_payload_roundtrips_without_an_object() {
    let broker = broker(AckPolicy::Auto);

    let response = broker
        .ingress
        .publish(Request::new(PublishRequest {
            subject: "x".to_string(),
            data: Vec::new(),
            headers: HashMap::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.sequence, 1);
    assert_eq!(response.object_name, "");

    let messages = fetch(&broker, "x", "c", 10).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].data.is_empty());
}

#[tokio::test]
async fn explicit_ack_policy_redelivers_until_acked() {
    let broker = broker(AckPolicy::Explicit);
    publish(&broker, "s", b"payload", &[]).await;

    // Without an ack the same message comes back.
    let first = fetch(&broker, "s", "c", 10).await;
    assert_eq!(first.len(), 1);
    let again = fetch(&broker, "s", "c", 10).await;
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].sequence, first[0].sequence);

    let response = broker
        .egress
        .ack_message(Request::new(AckMessageRequest {
            subject: "s".to_string(),
            durable_name: "c".to_string(),
            sequence: first[0].sequence,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);

    assert!(fetch(&broker, "s", "c", 10).await.is_empty());
}

#[tokio::test]
async fn subscribe_notifies_once_per_advance() {
    let broker = broker(AckPolicy::Auto);

    let mut notifications = broker
        .egress
        .subscribe(Request::new(SubscribeRequest {
            subject: "s".to_string(),
            durable_name: "c".to_string(),
            start_sequence: None,
        }))
        .await
        .unwrap()
        .into_inner();

    // Five publishes coalesce; the subscriber may observe intermediate
    // marks if a poll tick lands mid-burst, but sequences are strictly
    // increasing and reach the latest one.
    let mut latest = 0;
    for i in 0..5 {
        latest = publish(&broker, "s", format!("m{i}").as_bytes(), &[]).await;
    }

    let mut last_seen = 0;
    loop {
        let notification = timeout(Duration::from_secs(1), notifications.next())
            .await
            .expect("no notification arrived")
            .unwrap()
            .unwrap();
        assert_eq!(notification.subject, "s");
        assert!(notification.sequence > last_seen);
        last_seen = notification.sequence;
        if notification.sequence == latest {
            break;
        }
    }

    // Draining the subject produces no further notifications...
    let messages = fetch(&broker, "s", "c", 10).await;
    assert_eq!(messages.len(), 5);
    assert!(
        timeout(Duration::from_millis(150), notifications.next())
            .await
            .is_err()
    );

    // ...until the next publish.
    let next = publish(&broker, "s", b"more", &[]).await;
    let notification = timeout(Duration::from_secs(1), notifications.next())
        .await
        .expect("no notification after new publish")
        .unwrap()
        .unwrap();
    assert_eq!(notification.sequence, next);
}

#[tokio::test]
async fn fetch_respects_positions_set_by_ack() {
    let broker = broker(AckPolicy::Explicit);
    for i in 0..4 {
        publish(&broker, "s", format!("m{i}").as_bytes(), &[]).await;
    }

    broker
        .egress
        .ack_message(Request::new(AckMessageRequest {
            subject: "s".to_string(),
            durable_name: "c".to_string(),
            sequence: 2,
        }))
        .await
        .unwrap();

    let messages = fetch(&broker, "s", "c", 10).await;
    assert_eq!(
        messages.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![3, 4]
    );
}

#[tokio::test]
async fn cross_subject_traffic_stays_separate() {
    let broker = broker(AckPolicy::Auto);
    publish(&broker, "a", b"for a", &[]).await;
    publish(&broker, "b", b"for b", &[]).await;
    publish(&broker, "a", b"also for a", &[]).await;

    let a = fetch(&broker, "a", "c", 10).await;
    assert_eq!(a.len(), 2);
    assert!(a.iter().all(|m| m.subject == "a"));

    let b = fetch(&broker, "b", "c", 10).await;
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].subject, "b");
    // Global sequences interleave across subjects; within a subject they
    // are strictly ascending.
    assert!(a[0].sequence < a[1].sequence);
}
