//! gRPC client adapter for the external metadata store.
//!
//! The adapter owns a single channel guarded by an async read-write lock:
//! every call holds the read side for its full duration, and [`close`]
//! takes the write side, so closing happens-after all in-flight calls.
//! After close, every call fails with [`MetadataError::Closed`].
//!
//! Credentials are attached per request as a `Basic` authorization header.
//!
//! [`close`]: RemoteMetadataStore::close

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::RwLock;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

use toolstream_proto::metastore::meta_store_client::MetaStoreClient;
use toolstream_proto::metastore::{
    AdvancePositionRequest, ConsumerPositionRequest, DeleteExpiredRequest, GetMessageRequest,
    InsertMessageRequest, LatestSequenceRequest, MessagesAfterRequest, NextSequenceRequest,
    PingRequest,
};

use crate::convert;
use crate::error::{MetadataError, Result};
use crate::types::{ExpiredBatch, MessageRecord};
use crate::MetadataStore;

/// Client adapter speaking the metadata store's procedure surface.
pub struct RemoteMetadataStore {
    client: RwLock<Option<MetaStoreClient<Channel>>>,
    authorization: Option<MetadataValue<Ascii>>,
}

impl RemoteMetadataStore {
    /// Connect to the store at `address` (e.g. `http://localhost:3301`).
    ///
    /// An empty `user` disables the authorization header.
    pub async fn connect(
        address: &str,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Endpoint::from_shared(address.to_string())
            .map_err(|e| MetadataError::InvalidAddress(e.to_string()))?
            .timeout(timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        let authorization = if user.is_empty() {
            None
        } else {
            let token = BASE64.encode(format!("{user}:{password}"));
            let value = MetadataValue::try_from(format!("Basic {token}"))
                .map_err(|e| MetadataError::InvalidAddress(e.to_string()))?;
            Some(value)
        };

        Ok(Self {
            client: RwLock::new(Some(MetaStoreClient::new(channel))),
            authorization,
        })
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        if let Some(auth) = &self.authorization {
            request.metadata_mut().insert("authorization", auth.clone());
        }
        request
    }
}

#[async_trait]
impl MetadataStore for RemoteMetadataStore {
    async fn next_sequence(&self) -> Result<u64> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .next_sequence(self.request(NextSequenceRequest {}))
            .await
            .map_err(|s| MetadataError::call("next_sequence", s))?;
        Ok(response.into_inner().sequence)
    }

    async fn insert_message(&self, record: MessageRecord) -> Result<()> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        client
            .insert_message(self.request(InsertMessageRequest {
                sequence: record.sequence,
                subject: record.subject,
                headers: record.headers,
                object_name: record.object_name,
                timestamp_ms: record.timestamp_ms,
            }))
            .await
            .map_err(|s| MetadataError::call("insert_message", s))?;
        Ok(())
    }

    async fn get_message(&self, sequence: u64) -> Result<Option<MessageRecord>> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .get_message(self.request(GetMessageRequest { sequence }))
            .await;
        match response {
            Ok(response) => Ok(response
                .into_inner()
                .tuple
                .as_ref()
                .map(convert::message_from_tuple)),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(MetadataError::call("get_message", status)),
        }
    }

    async fn messages_after(
        &self,
        subject: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .messages_after(self.request(MessagesAfterRequest {
                subject: subject.to_string(),
                after_sequence,
                limit: limit.min(u32::MAX as usize) as u32,
            }))
            .await
            .map_err(|s| MetadataError::call("messages_after", s))?;
        Ok(response
            .into_inner()
            .tuples
            .iter()
            .map(convert::message_from_tuple)
            .collect())
    }

    async fn latest_sequence(&self, subject: &str) -> Result<u64> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .latest_sequence(self.request(LatestSequenceRequest {
                subject: subject.to_string(),
            }))
            .await
            .map_err(|s| MetadataError::call("latest_sequence", s))?;
        Ok(response.into_inner().sequence)
    }

    async fn consumer_position(&self, durable_name: &str, subject: &str) -> Result<u64> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .consumer_position(self.request(ConsumerPositionRequest {
                durable_name: durable_name.to_string(),
                subject: subject.to_string(),
            }))
            .await
            .map_err(|s| MetadataError::call("consumer_position", s))?;
        Ok(response.into_inner().last_sequence)
    }

    async fn advance_position(
        &self,
        durable_name: &str,
        subject: &str,
        sequence: u64,
    ) -> Result<bool> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .advance_position(self.request(AdvancePositionRequest {
                durable_name: durable_name.to_string(),
                subject: subject.to_string(),
                sequence,
            }))
            .await
            .map_err(|s| MetadataError::call("advance_position", s))?;
        Ok(response.into_inner().advanced)
    }

    async fn delete_expired(
        &self,
        default_cutoff_ms: i64,
        subject_cutoffs_ms: &HashMap<String, i64>,
    ) -> Result<ExpiredBatch> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        let response = client
            .delete_expired(self.request(DeleteExpiredRequest {
                default_cutoff_ms,
                subject_cutoffs_ms: subject_cutoffs_ms.clone(),
            }))
            .await
            .map_err(|s| MetadataError::call("delete_expired", s))?;
        let response = response.into_inner();
        Ok(ExpiredBatch {
            deleted_count: response.deleted_count,
            deleted: response
                .deleted
                .iter()
                .map(convert::expired_from_tuple)
                .collect(),
        })
    }

    async fn ping(&self) -> Result<()> {
        let guard = self.client.read().await;
        let mut client = guard.as_ref().ok_or(MetadataError::Closed)?.clone();
        client
            .ping(self.request(PingRequest {}))
            .await
            .map_err(|s| MetadataError::call("ping", s))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.client.write().await;
        guard.take();
        Ok(())
    }
}
