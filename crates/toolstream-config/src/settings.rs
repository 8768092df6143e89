//! Configuration structures and loading.
//!
//! YAML keys mirror the struct fields; every field also has an environment
//! variable override (listed next to the field). Environment wins over the
//! file, which wins over the defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Per-message acknowledgement policy of the fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    /// Advance the durable position after each successfully sent message.
    #[default]
    Auto,
    /// Only `AckMessage` advances the durable position.
    Explicit,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerConfig,
    pub metadata_store: MetadataStoreConfig,
    pub object_store: ObjectStoreConfig,
    pub secrets: SecretsConfig,
    pub ttl: TtlConfig,
    pub auth: AuthConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// SERVER_PORT; 0 means "use the service default" (50051 Ingress,
    /// 50052 Egress).
    pub port: u16,
    /// POLL_INTERVAL_MS (Egress subscription poll cadence).
    pub poll_interval_ms: u64,
    /// ACK_POLICY: auto | explicit.
    pub ack_policy: AckPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            poll_interval_ms: 1000,
            ack_policy: AckPolicy::Auto,
        }
    }
}

impl ServerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataStoreConfig {
    /// METASTORE_ADDRESS
    pub address: String,
    /// METASTORE_USER
    pub user: String,
    /// METASTORE_PASSWORD
    pub password: String,
    /// METASTORE_TIMEOUT_MS
    pub timeout_ms: u64,
    /// METASTORE_SECRETS_PATH; when set, user/password are hydrated from
    /// the secrets store.
    pub secrets_path: String,
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:3301".to_string(),
            user: "toolstream".to_string(),
            password: "changeme".to_string(),
            timeout_ms: 5000,
            secrets_path: String::new(),
        }
    }
}

impl MetadataStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// OBJECTSTORE_ENDPOINT
    pub endpoint: String,
    /// OBJECTSTORE_ACCESS_KEY_ID
    pub access_key_id: String,
    /// OBJECTSTORE_SECRET_ACCESS_KEY
    pub secret_access_key: String,
    /// OBJECTSTORE_USE_SSL
    pub use_ssl: bool,
    /// OBJECTSTORE_BUCKET_NAME
    pub bucket_name: String,
    /// OBJECTSTORE_SECRETS_PATH
    pub secrets_path: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            use_ssl: false,
            bucket_name: "toolstream".to_string(),
            secrets_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// SECRETS_ENABLED
    pub enabled: bool,
    /// SECRETS_ADDR
    pub address: String,
    /// SECRETS_TOKEN
    pub token: String,
    /// SECRETS_TOKEN_PATH
    pub token_path: String,
    /// SECRETS_NAMESPACE
    pub namespace: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "http://localhost:8200".to_string(),
            token: String::new(),
            token_path: String::new(),
            namespace: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChannelTtl {
    pub channel: String,
    pub secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// TTL_ENABLED
    pub enabled: bool,
    /// TTL_DEFAULT_SECS
    pub default_secs: u64,
    /// TTL_SWEEP_INTERVAL_SECS; 0 derives the cadence from the default
    /// retention (24 sweeps per retention window).
    pub sweep_interval_secs: u64,
    /// Per-subject retention overrides.
    pub channels: Vec<ChannelTtl>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_secs: 86_400,
            sweep_interval_secs: 0,
            channels: Vec::new(),
        }
    }
}

impl TtlConfig {
    pub fn default_retention(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    /// Sweep cadence: explicit override, else default retention / 24,
    /// floored at one second.
    pub fn sweep_interval(&self) -> Duration {
        if self.sweep_interval_secs > 0 {
            Duration::from_secs(self.sweep_interval_secs)
        } else {
            Duration::from_secs((self.default_secs / 24).max(1))
        }
    }

    /// Per-subject retention overrides in seconds.
    pub fn overrides(&self) -> HashMap<String, u64> {
        self.channels
            .iter()
            .map(|c| (c.channel.clone(), c.secs))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// AUTH_ENABLED
    pub enabled: bool,
    /// AUTH_REQUIRE; when false a valid token is still verified but
    /// requests without one pass.
    pub require_auth: bool,
    /// AUTH_JWT_ISSUER
    pub jwt_issuer: String,
    /// AUTH_JWT_SECRETS_PATH; secrets-store path of the RS256 key pair.
    pub jwt_secrets_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            require_auth: false,
            jwt_issuer: "toolstream".to_string(),
            jwt_secrets_path: "toolstream/jwt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// LOG_LEVEL: debug | info | warn | error
    pub level: String,
    /// LOG_FORMAT: json | console
    pub format: String,
    /// LOG_OUTPUT_PATH: "stdout" or a file path
    pub output_path: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            output_path: "stdout".to_string(),
        }
    }
}

/// Load configuration from an optional YAML file, overlay the environment,
/// apply the service default port, and validate.
pub fn load(path: Option<&str>, default_port: u16) -> Result<BrokerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
        None => BrokerConfig::default(),
    };

    overlay_env(&mut config)?;

    if config.server.port == 0 {
        config.server.port = default_port;
    }

    validate(&config)?;
    Ok(config)
}

fn env_string(key: &'static str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(key) {
        *target = value
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })?;
    }
    Ok(())
}

fn env_bool(key: &'static str, target: &mut bool) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(key) {
        *target = match value.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(ConfigError::InvalidEnv { key, value }),
        };
    }
    Ok(())
}

fn overlay_env(config: &mut BrokerConfig) -> Result<(), ConfigError> {
    env_parse("SERVER_PORT", &mut config.server.port)?;
    env_parse("POLL_INTERVAL_MS", &mut config.server.poll_interval_ms)?;
    if let Ok(value) = std::env::var("ACK_POLICY") {
        config.server.ack_policy = match value.as_str() {
            "auto" => AckPolicy::Auto,
            "explicit" => AckPolicy::Explicit,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    key: "ACK_POLICY",
                    value,
                })
            }
        };
    }

    env_string("METASTORE_ADDRESS", &mut config.metadata_store.address);
    env_string("METASTORE_USER", &mut config.metadata_store.user);
    env_string("METASTORE_PASSWORD", &mut config.metadata_store.password);
    env_parse("METASTORE_TIMEOUT_MS", &mut config.metadata_store.timeout_ms)?;
    env_string(
        "METASTORE_SECRETS_PATH",
        &mut config.metadata_store.secrets_path,
    );

    env_string("OBJECTSTORE_ENDPOINT", &mut config.object_store.endpoint);
    env_string(
        "OBJECTSTORE_ACCESS_KEY_ID",
        &mut config.object_store.access_key_id,
    );
    env_string(
        "OBJECTSTORE_SECRET_ACCESS_KEY",
        &mut config.object_store.secret_access_key,
    );
    env_bool("OBJECTSTORE_USE_SSL", &mut config.object_store.use_ssl)?;
    env_string("OBJECTSTORE_BUCKET_NAME", &mut config.object_store.bucket_name);
    env_string(
        "OBJECTSTORE_SECRETS_PATH",
        &mut config.object_store.secrets_path,
    );

    env_bool("SECRETS_ENABLED", &mut config.secrets.enabled)?;
    env_string("SECRETS_ADDR", &mut config.secrets.address);
    env_string("SECRETS_TOKEN", &mut config.secrets.token);
    env_string("SECRETS_TOKEN_PATH", &mut config.secrets.token_path);
    env_string("SECRETS_NAMESPACE", &mut config.secrets.namespace);

    env_bool("TTL_ENABLED", &mut config.ttl.enabled)?;
    env_parse("TTL_DEFAULT_SECS", &mut config.ttl.default_secs)?;
    env_parse("TTL_SWEEP_INTERVAL_SECS", &mut config.ttl.sweep_interval_secs)?;

    env_bool("AUTH_ENABLED", &mut config.auth.enabled)?;
    env_bool("AUTH_REQUIRE", &mut config.auth.require_auth)?;
    env_string("AUTH_JWT_ISSUER", &mut config.auth.jwt_issuer);
    env_string("AUTH_JWT_SECRETS_PATH", &mut config.auth.jwt_secrets_path);

    env_string("LOG_LEVEL", &mut config.logger.level);
    env_string("LOG_FORMAT", &mut config.logger.format);
    env_string("LOG_OUTPUT_PATH", &mut config.logger.output_path);

    Ok(())
}

fn validate(config: &BrokerConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid("server port is required".to_string()));
    }
    if config.metadata_store.address.is_empty() {
        return Err(ConfigError::Invalid(
            "metadata store address is required".to_string(),
        ));
    }
    if config.object_store.endpoint.is_empty() {
        return Err(ConfigError::Invalid(
            "object store endpoint is required".to_string(),
        ));
    }
    if config.object_store.bucket_name.is_empty() {
        return Err(ConfigError::Invalid(
            "object store bucket name is required".to_string(),
        ));
    }
    if config.secrets.enabled && config.secrets.address.is_empty() {
        return Err(ConfigError::Invalid(
            "secrets address is required when secrets are enabled".to_string(),
        ));
    }
    if config.auth.enabled && !config.secrets.enabled {
        return Err(ConfigError::Invalid(
            "auth requires the secrets store for key material".to_string(),
        ));
    }
    if !matches!(config.logger.level.as_str(), "debug" | "info" | "warn" | "error") {
        return Err(ConfigError::Invalid(format!(
            "unknown log level: {}",
            config.logger.level
        )));
    }
    if !matches!(config.logger.format.as_str(), "json" | "console") {
        return Err(ConfigError::Invalid(format!(
            "unknown log format: {}",
            config.logger.format
        )));
    }
    Ok(())
}
