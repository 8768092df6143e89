//! Secrets store client (Vault KV v2 over HTTP).
//!
//! Returns string maps by path. Used at startup to hydrate store
//! credentials and to fetch the JWT verification key; never called on the
//! request path.

use std::collections::HashMap;

use crate::error::SecretsError;
use crate::settings::{BrokerConfig, SecretsConfig};

pub struct SecretsClient {
    http: reqwest::Client,
    address: String,
    token: String,
    namespace: String,
}

impl SecretsClient {
    /// Build a client from config; `None` when the secrets store is
    /// disabled.
    pub fn new(config: &SecretsConfig) -> Result<Option<Self>, SecretsError> {
        if !config.enabled {
            return Ok(None);
        }

        let token = if !config.token.is_empty() {
            config.token.clone()
        } else if !config.token_path.is_empty() {
            std::fs::read_to_string(&config.token_path)
                .map_err(SecretsError::TokenFile)?
                .trim()
                .to_string()
        } else {
            return Err(SecretsError::NoToken);
        };

        Ok(Some(Self {
            http: reqwest::Client::new(),
            address: config.address.trim_end_matches('/').to_string(),
            token,
            namespace: config.namespace.clone(),
        }))
    }

    /// Fetch the string map stored at `path`.
    pub async fn get(&self, path: &str) -> Result<HashMap<String, String>, SecretsError> {
        let url = format!("{}/v1/secret/data/{}", self.address, path);
        let mut request = self.http.get(url).header("X-Vault-Token", &self.token);
        if !self.namespace.is_empty() {
            request = request.header("X-Vault-Namespace", &self.namespace);
        }

        let response = request.send().await?.error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        let data = body
            .get("data")
            .and_then(|d| d.get("data"))
            .and_then(|d| d.as_object())
            .ok_or_else(|| SecretsError::Missing(path.to_string()))?;

        Ok(data
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect())
    }

    /// Fetch one named entry from the map at `path`.
    pub async fn get_key(&self, path: &str, key: &'static str) -> Result<String, SecretsError> {
        let secret = self.get(path).await?;
        secret
            .get(key)
            .cloned()
            .ok_or_else(|| SecretsError::MissingKey {
                path: path.to_string(),
                key,
            })
    }
}

/// Overlay credentials from the secrets store onto the configuration for
/// every component that names a secrets path.
pub async fn apply_secrets(
    config: &mut BrokerConfig,
    client: &SecretsClient,
) -> Result<(), SecretsError> {
    if !config.metadata_store.secrets_path.is_empty() {
        let secret = client.get(&config.metadata_store.secrets_path).await?;
        if let Some(user) = secret.get("user") {
            config.metadata_store.user = user.clone();
        }
        if let Some(password) = secret.get("password") {
            config.metadata_store.password = password.clone();
        }
    }

    if !config.object_store.secrets_path.is_empty() {
        let secret = client.get(&config.object_store.secrets_path).await?;
        if let Some(access_key) = secret.get("access_key_id") {
            config.object_store.access_key_id = access_key.clone();
        }
        if let Some(secret_key) = secret.get("secret_access_key") {
            config.object_store.secret_access_key = secret_key.clone();
        }
    }

    Ok(())
}
