//! Ingress gRPC service implementation.

use std::sync::Arc;

use bytes::Bytes;
use tonic::{Request, Response, Status};
use tracing::{error, warn};

use toolstream_auth::{authorize, Action};
use toolstream_proto::toolstream::ingress_service_server::IngressService;
use toolstream_proto::toolstream::{PublishRequest, PublishResponse};

use crate::publish::PublishCoordinator;

/// Ingress gRPC handler.
pub struct IngressHandler {
    coordinator: Arc<PublishCoordinator>,
}

impl IngressHandler {
    pub fn new(coordinator: Arc<PublishCoordinator>) -> Self {
        Self { coordinator }
    }
}

fn failure(sequence: u64, message: String) -> PublishResponse {
    PublishResponse {
        sequence,
        object_name: String::new(),
        status_code: 1,
        error_message: message,
    }
}

#[tonic::async_trait]
impl IngressService for IngressHandler {
    #[tracing::instrument(
        skip(self, request),
        fields(
            subject = %request.get_ref().subject,
            data_size = request.get_ref().data.len(),
        )
    )]
    async fn publish(
        &self,
        request: Request<PublishRequest>,
    ) -> Result<Response<PublishResponse>, Status> {
        // Permission check happens before any sequence is allocated.
        authorize(&request, Action::Publish, &request.get_ref().subject)?;

        let req = request.into_inner();
        if req.subject.is_empty() {
            warn!("publish rejected: empty subject");
            return Ok(Response::new(failure(
                0,
                "subject cannot be empty".to_string(),
            )));
        }

        let mut headers = req.headers;
        if !req.data.is_empty() {
            headers.insert("data-size".to_string(), req.data.len().to_string());
        }

        match self
            .coordinator
            .publish(&req.subject, Bytes::from(req.data), headers)
            .await
        {
            Ok(receipt) => Ok(Response::new(PublishResponse {
                sequence: receipt.sequence,
                object_name: receipt.object_name,
                status_code: 0,
                error_message: String::new(),
            })),
            Err(e) => {
                error!(error = %e, "publish failed");
                // Business failures travel in-band so the caller still
                // sees the allocated sequence.
                Ok(Response::new(failure(e.sequence(), e.to_string())))
            }
        }
    }
}
