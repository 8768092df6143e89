//! Egress gRPC service implementation.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use toolstream_auth::{authorize, Action};
use toolstream_metadata::MetadataError;
use toolstream_proto::toolstream::egress_service_server::EgressService;
use toolstream_proto::toolstream::{
    AckMessageRequest, AckMessageResponse, FetchRequest, GetLastSequenceRequest,
    GetLastSequenceResponse, Message as PbMessage, Notification as PbNotification,
    SubscribeRequest,
};

use crate::fetch::{FetchEngine, Message};
use crate::subscribe::SubscriptionPoller;

/// Notification buffer per subscription; when full, the poller blocks
/// until the subscriber drains or disconnects.
const NOTIFICATION_BUFFER: usize = 100;

/// Egress gRPC handler.
pub struct EgressHandler {
    poller: Arc<SubscriptionPoller>,
    engine: Arc<FetchEngine>,
}

impl EgressHandler {
    pub fn new(poller: Arc<SubscriptionPoller>, engine: Arc<FetchEngine>) -> Self {
        Self { poller, engine }
    }
}

fn upstream(error: MetadataError) -> Status {
    Status::internal(format!("metadata store error: {error}"))
}

fn require_subject_and_durable(subject: &str, durable_name: &str) -> Result<(), Status> {
    if subject.is_empty() {
        return Err(Status::invalid_argument("subject cannot be empty"));
    }
    if durable_name.is_empty() {
        return Err(Status::invalid_argument("durable_name cannot be empty"));
    }
    Ok(())
}

fn pb_message(message: Message) -> PbMessage {
    PbMessage {
        subject: message.subject,
        sequence: message.sequence,
        data: message.data.to_vec(),
        headers: message.headers,
        timestamp: Some(prost_types::Timestamp {
            seconds: message.timestamp_ms.div_euclid(1000),
            nanos: (message.timestamp_ms.rem_euclid(1000) * 1_000_000) as i32,
        }),
    }
}

#[tonic::async_trait]
impl EgressService for EgressHandler {
    type SubscribeStream =
        Pin<Box<dyn Stream<Item = Result<PbNotification, Status>> + Send + 'static>>;
    type FetchStream = Pin<Box<dyn Stream<Item = Result<PbMessage, Status>> + Send + 'static>>;

    #[tracing::instrument(
        skip(self, request),
        fields(
            subject = %request.get_ref().subject,
            durable_name = %request.get_ref().durable_name,
        )
    )]
    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        authorize(&request, Action::Subscribe, &request.get_ref().subject)?;

        let req = request.into_inner();
        require_subject_and_durable(&req.subject, &req.durable_name)?;

        let high_water = self
            .poller
            .initial_high_water(&req.subject, &req.durable_name, req.start_sequence)
            .await
            .map_err(upstream)?;

        info!(start_sequence = ?req.start_sequence, high_water, "subscribe accepted");

        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let poller = self.poller.clone();
        tokio::spawn(async move {
            poller.run(req.subject, high_water, tx).await;
        });

        let stream = ReceiverStream::new(rx).map(|notification| {
            Ok(PbNotification {
                subject: notification.subject,
                sequence: notification.sequence,
            })
        });
        Ok(Response::new(Box::pin(stream)))
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            subject = %request.get_ref().subject,
            durable_name = %request.get_ref().durable_name,
            batch_size = request.get_ref().batch_size,
        )
    )]
    async fn fetch(
        &self,
        request: Request<FetchRequest>,
    ) -> Result<Response<Self::FetchStream>, Status> {
        authorize(&request, Action::Fetch, &request.get_ref().subject)?;

        let req = request.into_inner();
        require_subject_and_durable(&req.subject, &req.durable_name)?;

        let messages = self
            .engine
            .fetch(&req.subject, &req.durable_name, req.batch_size)
            .await
            .map_err(upstream)?;

        // Capacity 1 keeps position advances at most one message ahead of
        // what the subscriber has actually pulled.
        let (tx, rx) = mpsc::channel(1);
        let engine = self.engine.clone();
        let auto_ack = engine.ack_policy() == toolstream_config::AckPolicy::Auto;
        tokio::spawn(async move {
            for message in messages {
                let sequence = message.sequence;
                if tx.send(Ok(pb_message(message))).await.is_err() {
                    info!(sequence, "fetch stream cancelled");
                    return;
                }
                if auto_ack {
                    if let Err(e) = engine
                        .acknowledge(&req.durable_name, &req.subject, sequence)
                        .await
                    {
                        warn!(sequence, error = %e, "failed to advance consumer position");
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            subject = %request.get_ref().subject,
            durable_name = %request.get_ref().durable_name,
            sequence = request.get_ref().sequence,
        )
    )]
    async fn ack_message(
        &self,
        request: Request<AckMessageRequest>,
    ) -> Result<Response<AckMessageResponse>, Status> {
        authorize(&request, Action::Fetch, &request.get_ref().subject)?;

        let req = request.into_inner();
        require_subject_and_durable(&req.subject, &req.durable_name)?;

        // Ack failures are reported in-band so clients can handle them
        // without tearing down streams.
        match self
            .engine
            .acknowledge(&req.durable_name, &req.subject, req.sequence)
            .await
        {
            Ok(()) => Ok(Response::new(AckMessageResponse {
                success: true,
                error_message: String::new(),
            })),
            Err(e) => {
                warn!(error = %e, "ack failed");
                Ok(Response::new(AckMessageResponse {
                    success: false,
                    error_message: e.to_string(),
                }))
            }
        }
    }

    async fn get_last_sequence(
        &self,
        request: Request<GetLastSequenceRequest>,
    ) -> Result<Response<GetLastSequenceResponse>, Status> {
        authorize(&request, Action::Fetch, &request.get_ref().subject)?;

        let req = request.into_inner();
        if req.subject.is_empty() {
            return Err(Status::invalid_argument("subject cannot be empty"));
        }

        let last_sequence = self
            .engine
            .last_sequence(&req.subject)
            .await
            .map_err(upstream)?;
        Ok(Response::new(GetLastSequenceResponse { last_sequence }))
    }
}
