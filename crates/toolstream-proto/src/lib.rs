//! Toolstream Protocol Buffer Definitions
//!
//! This crate contains the gRPC service definitions and message types for the
//! toolstream broker.
//!
//! ## Services
//!
//! - **IngressService**: publish side (port 50051)
//!   - `Publish`: three-step publish protocol with in-band status codes
//! - **EgressService**: subscribe side (port 50052)
//!   - `Subscribe`: server-streamed notifications per subject
//!   - `Fetch`: server-streamed message batches for a durable consumer
//!   - `AckMessage`, `GetLastSequence`: unary consumer helpers
//! - **MetaStore**: procedure contract of the external metadata store,
//!   consumed by the broker's client adapter
//!
//! ## Usage
//!
//! ```ignore
//! use toolstream_proto::toolstream::{
//!     ingress_service_client::IngressServiceClient, PublishRequest,
//! };
//!
//! let mut client = IngressServiceClient::connect("http://localhost:50051").await?;
//! let response = client
//!     .publish(PublishRequest {
//!         subject: "orders".to_string(),
//!         data: b"hello".to_vec(),
//!         headers: Default::default(),
//!     })
//!     .await?;
//! println!("sequence: {}", response.into_inner().sequence);
//! ```

/// Broker RPC surface (Ingress + Egress).
pub mod toolstream {
    tonic::include_proto!("toolstream");
}

/// Metadata store procedure contract.
pub mod metastore {
    tonic::include_proto!("toolstream.meta");
}

/// Encoded file descriptor set for gRPC reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    tonic::include_file_descriptor_set!("toolstream_descriptor");
