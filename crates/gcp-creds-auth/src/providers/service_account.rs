//! Service account keys: JWT-bearer assertion grant.

use super::{http_error, read_token_response};
use crate::config::AuthConfig;
use crate::token::{AccessToken, TokenSource};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use gcp_creds_core::{CallContext, Error, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A Google service account JSON key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Claims of the self-signed assertion exchanged for an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, scopes: &[String], ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            iss: key.client_email.clone(),
            scope: scopes.join(" "),
            aud: key.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// RS256 signer for assertion JWTs.
pub struct AssertionSigner {
    encoding_key: EncodingKey,
    key_id: Option<String>,
}

impl AssertionSigner {
    pub fn new_rs256(private_key_pem: &[u8], key_id: Option<String>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| Error::InvalidCredentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            encoding_key,
            key_id,
        })
    }

    pub fn sign(&self, claims: &AssertionClaims) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| Error::InvalidCredentials(format!("failed to sign assertion: {}", e)))
    }
}

/// Token source minting tokens from a service account key.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    signer: AssertionSigner,
    scopes: Vec<String>,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, config: &AuthConfig) -> Result<Self> {
        let signer =
            AssertionSigner::new_rs256(key.private_key.as_bytes(), key.private_key_id.clone())?;

        Ok(Self {
            key,
            signer,
            scopes: config.scopes.clone(),
            client: config.http_client()?,
            timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self, ctx: &CallContext) -> Result<AccessToken> {
        debug!(
            client_email = %self.key.client_email,
            "Requesting service account access token"
        );

        let claims = AssertionClaims::new(&self.key, &self.scopes, Duration::hours(1));
        let assertion = self.signer.sign(&claims)?;

        ctx.run(async {
            let response = self
                .client
                .post(&self.key.token_uri)
                .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                .send()
                .await
                .map_err(|e| http_error(e, self.timeout))?;

            let token = read_token_response(response, "OAuth token endpoint", self.timeout).await?;
            Ok(token.into_access_token())
        })
        .await
    }
}
