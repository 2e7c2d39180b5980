//! Authorized user credentials: refresh token grant.

use super::{http_error, read_token_response};
use crate::config::AuthConfig;
use crate::token::{AccessToken, TokenSource};
use async_trait::async_trait;
use gcp_creds_core::{CallContext, Result};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

#[derive(Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

impl fmt::Debug for AuthorizedUserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUserKey")
            .field("client_id", &self.client_id)
            .field("quota_project_id", &self.quota_project_id)
            .finish_non_exhaustive()
    }
}

pub struct AuthorizedUserTokenSource {
    key: AuthorizedUserKey,
    token_url: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl AuthorizedUserTokenSource {
    pub fn new(key: AuthorizedUserKey, config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            key,
            token_url: config.oauth_token_url.clone(),
            client: config.http_client()?,
            timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserTokenSource {
    async fn token(&self, ctx: &CallContext) -> Result<AccessToken> {
        debug!(client_id = %self.key.client_id, "Refreshing authorized user token");

        ctx.run(async {
            let response = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("client_id", self.key.client_id.as_str()),
                    ("client_secret", self.key.client_secret.as_str()),
                    ("refresh_token", self.key.refresh_token.as_str()),
                ])
                .send()
                .await
                .map_err(|e| http_error(e, self.timeout))?;

            let token = read_token_response(response, "OAuth token endpoint", self.timeout).await?;
            Ok(token.into_access_token())
        })
        .await
    }
}
