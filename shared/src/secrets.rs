//! AWS Secrets Manager integration for the Notion token and Stripe key.

use aws_sdk_secretsmanager::Client as SecretsClient;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;

use crate::config::SecretSource;
use crate::{Config, Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Resolved API credentials.
#[derive(Clone)]
pub struct Credentials {
    pub notion_token: String,
    pub stripe_secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("notion_token", &crate::config::mask_secret(&self.notion_token))
            .field(
                "stripe_secret_key",
                &crate::config::mask_secret(&self.stripe_secret_key),
            )
            .finish()
    }
}

impl Credentials {
    /// Resolve both credentials, only touching Secrets Manager when an ARN is configured.
    pub async fn resolve(config: &Config) -> Result<Self> {
        let needs_aws = matches!(config.notion_token, SecretSource::Arn(_))
            || matches!(config.stripe_secret_key, SecretSource::Arn(_));

        let client = if needs_aws {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Some(SecretsClient::new(&aws_config))
        } else {
            None
        };

        Ok(Self {
            notion_token: resolve_source(client.as_ref(), &config.notion_token).await?,
            stripe_secret_key: resolve_source(client.as_ref(), &config.stripe_secret_key).await?,
        })
    }
}

async fn resolve_source(client: Option<&SecretsClient>, source: &SecretSource) -> Result<String> {
    match source {
        SecretSource::Value(value) => Ok(value.clone()),
        SecretSource::Arn(arn) => {
            let client = client
                .ok_or_else(|| Error::Internal("Secrets Manager client not initialised".to_string()))?;
            let raw = get_secret(client, arn).await?;
            Ok(extract_secret_value(&raw))
        }
    }
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    // Check cache first
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .to_string();

    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}

/// Secrets may be stored raw or as `{"value": "..."}` / `{"secret": "..."}` / `{"token": "..."}`.
pub fn extract_secret_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["value", "secret", "token"] {
            if let Some(value) = map.get(key).and_then(|v| v.as_str()) {
                return value.to_string();
            }
        }
    }
    trimmed.to_string()
}
