//! Toolstream Egress Service
//!
//! Serves the three subscriber operations on top of the metadata store and
//! the object store: long-lived subject subscriptions with at-least-once
//! notifications, pull-style batch fetch that advances the durable
//! position, and explicit acknowledgement.

pub mod fetch;
pub mod services;
pub mod subscribe;

pub use fetch::{FetchEngine, Message};
pub use services::EgressHandler;
pub use subscribe::{Notification, SubscriptionPoller};
