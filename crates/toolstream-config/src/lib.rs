//! Toolstream Configuration
//!
//! Configuration is loaded from an optional YAML file and then overlaid
//! from environment variables; the environment takes precedence. Secrets
//! (store credentials, object store keys, the JWT public key) can be
//! hydrated from a secrets manager before any connection is made.
//!
//! ```ignore
//! let mut config = toolstream_config::load(Some("config.yml"), 50051)?;
//! if let Some(secrets) = SecretsClient::new(&config.secrets)? {
//!     toolstream_config::apply_secrets(&mut config, &secrets).await?;
//! }
//! toolstream_config::init_logging(&config.logger)?;
//! ```

pub mod error;
pub mod secrets;
pub mod settings;
pub mod telemetry;

pub use error::{ConfigError, SecretsError};
pub use secrets::{apply_secrets, SecretsClient};
pub use settings::{
    load, AckPolicy, AuthConfig, BrokerConfig, ChannelTtl, LoggerConfig, MetadataStoreConfig,
    ObjectStoreConfig, SecretsConfig, ServerConfig, TtlConfig,
};
pub use telemetry::init_logging;
