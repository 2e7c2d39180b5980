//! Access tokens and the token source abstraction.

use crate::config::AuthConfig;
use crate::external_account::{ExternalAccountDescriptor, SUBJECT_TOKEN_PATH, exchange};
use crate::providers::StaticKey;
use crate::resolver::CredentialInput;
use crate::supplier::SecretTokenSupplier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_creds_core::{CallContext, Error, Result, SecretStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// A scoped OAuth access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn bearer(access_token: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry,
        }
    }

    /// Render the token in the requested output encoding.
    pub fn render(&self, format: TokenFormat) -> Result<String> {
        match format {
            TokenFormat::Text => Ok(self.access_token.clone()),
            TokenFormat::Json => Ok(serde_json::to_string(self)?),
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Output encoding for an access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenFormat {
    /// The raw access token string.
    #[default]
    Text,
    /// The full token record as JSON.
    Json,
}

impl FromStr for TokenFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(TokenFormat::Text),
            "json" => Ok(TokenFormat::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenFormat::Text => write!(f, "text"),
            TokenFormat::Json => write!(f, "json"),
        }
    }
}

/// A re-invocable provider of access tokens.
///
/// Each call performs a fresh fetch; nothing is cached between calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, ctx: &CallContext) -> Result<AccessToken>;
}

/// Build the token source backing a resolved credential input.
pub async fn new_token_source(
    ctx: &CallContext,
    input: &CredentialInput,
    store: Arc<dyn SecretStore>,
    config: &AuthConfig,
) -> Result<Box<dyn TokenSource>> {
    match input {
        CredentialInput::StaticKey(secret) => {
            let key = ctx.run(store.plaintext(secret)).await?;
            let key = StaticKey::from_json(key.expose())?;
            debug!(kind = %key.kind(), "Using static credential key");
            key.into_token_source(config)
        }
        CredentialInput::FederatedIdentity {
            provider,
            subject_token,
        } => {
            debug!(provider = %provider, "Using workload identity federation");
            let descriptor = ExternalAccountDescriptor::build(provider, SUBJECT_TOKEN_PATH)
                .with_token_url(&config.sts_token_url)
                .with_universe_domain(&config.universe_domain);
            let supplier = SecretTokenSupplier::new(store, subject_token.clone());
            let source = exchange(descriptor, Arc::new(supplier), config)?;
            Ok(Box::new(source))
        }
    }
}
