//! Configuration and secrets error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("secrets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret not found: {0}")]
    Missing(String),

    #[error("secret {path} has no {key} entry")]
    MissingKey { path: String, key: &'static str },

    #[error("secrets token not configured")]
    NoToken,

    #[error("failed to read secrets token file: {0}")]
    TokenFile(std::io::Error),
}
