//! Remote adapter integration tests.
//!
//! Spins up an in-process gRPC MetaStore server backed by the in-memory
//! store, then drives it through `RemoteMetadataStore`. This covers the
//! full client adapter: request plumbing, weakly-typed tuple decoding, and
//! the close-happens-after semantics.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use prost_types::value::Kind;
use prost_types::{Struct, Value};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use toolstream_metadata::{
    MemoryMetadataStore, MessageRecord, MetadataError, MetadataStore, RemoteMetadataStore,
};
use toolstream_proto::metastore::meta_store_server::{MetaStore, MetaStoreServer};
use toolstream_proto::metastore::*;

fn number(n: f64) -> Value {
    Value {
        kind: Some(Kind::NumberValue(n)),
    }
}

fn string(s: &str) -> Value {
    Value {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn headers_value(headers: &HashMap<String, String>) -> Value {
    let fields: BTreeMap<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.clone(), string(v)))
        .collect();
    Value {
        kind: Some(Kind::StructValue(Struct { fields })),
    }
}

fn message_tuple(record: &MessageRecord) -> Tuple {
    Tuple {
        fields: vec![
            number(record.sequence as f64),
            headers_value(&record.headers),
            string(&record.object_name),
            string(&record.subject),
            number(record.timestamp_ms as f64),
        ],
    }
}

fn internal(e: MetadataError) -> Status {
    Status::internal(e.to_string())
}

/// Test server exposing the store procedure surface over real gRPC.
struct TestMetaStore {
    inner: Arc<MemoryMetadataStore>,
}

#[tonic::async_trait]
impl MetaStore for TestMetaStore {
    async fn next_sequence(
        &self,
        _request: Request<NextSequenceRequest>,
    ) -> Result<Response<NextSequenceResponse>, Status> {
        let sequence = self.inner.next_sequence().await.map_err(internal)?;
        Ok(Response::new(NextSequenceResponse { sequence }))
    }

    async fn insert_message(
        &self,
        request: Request<InsertMessageRequest>,
    ) -> Result<Response<InsertMessageResponse>, Status> {
        let req = request.into_inner();
        self.inner
            .insert_message(MessageRecord {
                sequence: req.sequence,
                subject: req.subject,
                headers: req.headers,
                object_name: req.object_name,
                timestamp_ms: req.timestamp_ms,
            })
            .await
            .map_err(internal)?;
        Ok(Response::new(InsertMessageResponse {}))
    }

    async fn get_message(
        &self,
        request: Request<GetMessageRequest>,
    ) -> Result<Response<GetMessageResponse>, Status> {
        let record = self
            .inner
            .get_message(request.into_inner().sequence)
            .await
            .map_err(internal)?;
        Ok(Response::new(GetMessageResponse {
            tuple: record.as_ref().map(message_tuple),
        }))
    }

    async fn messages_after(
        &self,
        request: Request<MessagesAfterRequest>,
    ) -> Result<Response<MessagesAfterResponse>, Status> {
        let req = request.into_inner();
        let records = self
            .inner
            .messages_after(&req.subject, req.after_sequence, req.limit as usize)
            .await
            .map_err(internal)?;
        Ok(Response::new(MessagesAfterResponse {
            tuples: records.iter().map(message_tuple).collect(),
        }))
    }

    async fn latest_sequence(
        &self,
        request: Request<LatestSequenceRequest>,
    ) -> Result<Response<LatestSequenceResponse>, Status> {
        let sequence = self
            .inner
            .latest_sequence(&request.into_inner().subject)
            .await
            .map_err(internal)?;
        Ok(Response::new(LatestSequenceResponse { sequence }))
    }

    async fn consumer_position(
        &self,
        request: Request<ConsumerPositionRequest>,
    ) -> Result<Response<ConsumerPositionResponse>, Status> {
        let req = request.into_inner();
        let last_sequence = self
            .inner
            .consumer_position(&req.durable_name, &req.subject)
            .await
            .map_err(internal)?;
        Ok(Response::new(ConsumerPositionResponse { last_sequence }))
    }

    async fn advance_position(
        &self,
        request: Request<AdvancePositionRequest>,
    ) -> Result<Response<AdvancePositionResponse>, Status> {
        let req = request.into_inner();
        let advanced = self
            .inner
            .advance_position(&req.durable_name, &req.subject, req.sequence)
            .await
            .map_err(internal)?;
        Ok(Response::new(AdvancePositionResponse { advanced }))
    }

    async fn delete_expired(
        &self,
        request: Request<DeleteExpiredRequest>,
    ) -> Result<Response<DeleteExpiredResponse>, Status> {
        let req = request.into_inner();
        let batch = self
            .inner
            .delete_expired(req.default_cutoff_ms, &req.subject_cutoffs_ms)
            .await
            .map_err(internal)?;
        Ok(Response::new(DeleteExpiredResponse {
            deleted_count: batch.deleted_count,
            deleted: batch
                .deleted
                .iter()
                .map(|expired| Tuple {
                    fields: vec![
                        number(expired.sequence as f64),
                        string(&expired.subject),
                        string(&expired.object_name),
                    ],
                })
                .collect(),
        }))
    }

    async fn ping(&self, _request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        self.inner.ping().await.map_err(internal)?;
        Ok(Response::new(PingResponse {}))
    }
}

async fn start_server() -> (String, Arc<MemoryMetadataStore>) {
    let backing = Arc::new(MemoryMetadataStore::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = MetaStoreServer::new(TestMetaStore {
        inner: backing.clone(),
    });
    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (format!("http://{addr}"), backing)
}

async fn connect(address: &str) -> RemoteMetadataStore {
    RemoteMetadataStore::connect(address, "toolstream", "changeme", Duration::from_secs(2))
        .await
        .unwrap()
}

#[tokio::test]
async fn full_message_lifecycle_over_the_wire() {
    let (address, _backing) = start_server().await;
    let store = connect(&address).await;

    store.ping().await.unwrap();

    let sequence = store.next_sequence().await.unwrap();
    assert_eq!(sequence, 1);

    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "text/plain".to_string());
    store
        .insert_message(MessageRecord {
            sequence,
            subject: "orders".to_string(),
            headers: headers.clone(),
            object_name: "orders_1".to_string(),
            timestamp_ms: 1_700_000_000_000,
        })
        .await
        .unwrap();

    let record = store.get_message(1).await.unwrap().unwrap();
    assert_eq!(record.sequence, 1);
    assert_eq!(record.subject, "orders");
    assert_eq!(record.object_name, "orders_1");
    assert_eq!(record.headers, headers);
    assert_eq!(record.timestamp_ms, 1_700_000_000_000);

    assert!(store.get_message(99).await.unwrap().is_none());
    assert_eq!(store.latest_sequence("orders").await.unwrap(), 1);
    assert_eq!(store.latest_sequence("missing").await.unwrap(), 0);
}

#[tokio::test]
async fn batched_reads_and_positions_over_the_wire() {
    let (address, _backing) = start_server().await;
    let store = connect(&address).await;

    for _ in 0..4 {
        let sequence = store.next_sequence().await.unwrap();
        store
            .insert_message(MessageRecord {
                sequence,
                subject: "a".to_string(),
                headers: HashMap::new(),
                object_name: format!("a_{sequence}"),
                timestamp_ms: 0,
            })
            .await
            .unwrap();
    }

    let batch = store.messages_after("a", 1, 2).await.unwrap();
    assert_eq!(
        batch.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![2, 3]
    );

    assert_eq!(store.consumer_position("c", "a").await.unwrap(), 0);
    assert!(store.advance_position("c", "a", 3).await.unwrap());
    assert!(!store.advance_position("c", "a", 2).await.unwrap());
    assert_eq!(store.consumer_position("c", "a").await.unwrap(), 3);
}

#[tokio::test]
async fn expiry_travels_as_weak_tuples() {
    let (address, _backing) = start_server().await;
    let store = connect(&address).await;

    let sequence = store.next_sequence().await.unwrap();
    store
        .insert_message(MessageRecord {
            sequence,
            subject: "old".to_string(),
            headers: HashMap::new(),
            object_name: "old_1".to_string(),
            timestamp_ms: 1000,
        })
        .await
        .unwrap();

    let batch = store.delete_expired(5000, &HashMap::new()).await.unwrap();
    assert_eq!(batch.deleted_count, 1);
    assert_eq!(batch.deleted[0].sequence, 1);
    assert_eq!(batch.deleted[0].subject, "old");
    assert_eq!(batch.deleted[0].object_name, "old_1");

    assert!(store.get_message(1).await.unwrap().is_none());
}

#[tokio::test]
async fn calls_after_close_fail_fast() {
    let (address, _backing) = start_server().await;
    let store = connect(&address).await;

    store.ping().await.unwrap();
    store.close().await.unwrap();

    assert!(matches!(
        store.next_sequence().await,
        Err(MetadataError::Closed)
    ));
    assert!(matches!(store.ping().await, Err(MetadataError::Closed)));
}
