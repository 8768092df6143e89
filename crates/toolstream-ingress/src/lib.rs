//! Toolstream Ingress Service
//!
//! Accepts publish requests and runs the write-order protocol that keeps
//! metadata and payloads consistent: allocate sequence, upload payload,
//! commit metadata. Also hosts the TTL sweeper that jointly expires
//! metadata tuples and their objects.

pub mod publish;
pub mod services;
pub mod ttl;

pub use publish::{PublishCoordinator, PublishError, PublishReceipt};
pub use services::IngressHandler;
pub use ttl::{SweepStats, TtlSweeper};
