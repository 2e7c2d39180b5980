//! GCP Workload Identity Federation token exchange.

use crate::config::AuthConfig;
use crate::providers::{http_error, read_token_response};
use crate::supplier::SubjectTokenSupplier;
use crate::token::{AccessToken, TokenSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_creds_core::{CallContext, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Google STS token endpoint.
pub const STS_TOKEN_URL: &str = "https://sts.googleapis.com/v1/token";

/// Subject token type for OIDC ID tokens.
pub const JWT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";

/// Path at which the subject token is mounted inside an execution context.
pub const SUBJECT_TOKEN_PATH: &str = "/.gcp/token";

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const IAM_SCOPE: &str = "https://www.googleapis.com/auth/iam";
const EXTERNAL_ACCOUNT_TYPE: &str = "external_account";

/// How the subject token file is encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSourceFormat {
    #[default]
    Text,
    Json { subject_token_field_name: String },
}

/// Where the subject token is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSource {
    pub file: String,
    #[serde(default)]
    pub format: CredentialSourceFormat,
}

/// An `external_account` credential configuration document.
///
/// Container tooling (gcloud, client libraries) reads this from
/// `GOOGLE_APPLICATION_CREDENTIALS` and performs the exchange itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccountDescriptor {
    #[serde(default = "default_universe_domain")]
    pub universe_domain: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub audience: String,
    pub subject_token_type: String,
    pub token_url: String,
    pub credential_source: CredentialSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_impersonation_url: Option<String>,
}

fn default_universe_domain() -> String {
    "googleapis.com".to_string()
}

impl ExternalAccountDescriptor {
    /// Describe a file-sourced exchange against `provider`.
    pub fn build(provider: &str, subject_token_file: &str) -> Self {
        Self {
            universe_domain: default_universe_domain(),
            account_type: EXTERNAL_ACCOUNT_TYPE.to_string(),
            audience: provider.to_string(),
            subject_token_type: JWT_TOKEN_TYPE.to_string(),
            token_url: STS_TOKEN_URL.to_string(),
            credential_source: CredentialSource {
                file: subject_token_file.to_string(),
                format: CredentialSourceFormat::Text,
            },
            service_account_impersonation_url: None,
        }
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    pub fn with_universe_domain(mut self, universe_domain: &str) -> Self {
        self.universe_domain = universe_domain.to_string();
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        let malformed = |reason: String| Error::Exchange(format!("malformed descriptor: {}", reason));

        if self.account_type != EXTERNAL_ACCOUNT_TYPE {
            return Err(malformed(format!("unexpected type {:?}", self.account_type)));
        }
        if self.audience.is_empty() {
            return Err(malformed("audience is empty".to_string()));
        }
        if self.subject_token_type.is_empty() {
            return Err(malformed("subject_token_type is empty".to_string()));
        }

        let urls = std::iter::once(("token_url", &self.token_url)).chain(
            self.service_account_impersonation_url
                .as_ref()
                .map(|url| ("service_account_impersonation_url", url)),
        );
        for (field, value) in urls {
            match url::Url::parse(value) {
                Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {}
                _ => return Err(malformed(format!("{} {:?} is not an http(s) URL", field, value))),
            }
        }

        Ok(())
    }
}

/// Prepare a token source that exchanges subject tokens according to `descriptor`.
///
/// The descriptor is validated up front; no request is made until
/// [`TokenSource::token`] is called.
pub fn exchange(
    descriptor: ExternalAccountDescriptor,
    supplier: Arc<dyn SubjectTokenSupplier>,
    config: &AuthConfig,
) -> Result<ExternalAccountTokenSource> {
    descriptor.validate()?;

    Ok(ExternalAccountTokenSource {
        descriptor,
        supplier,
        scopes: config.scopes.clone(),
        client: config.http_client()?,
        timeout: config.request_timeout,
    })
}

/// Workload Identity Federation token source.
pub struct ExternalAccountTokenSource {
    descriptor: ExternalAccountDescriptor,
    supplier: Arc<dyn SubjectTokenSupplier>,
    scopes: Vec<String>,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

#[derive(Debug, Serialize)]
struct StsTokenRequest<'a> {
    grant_type: &'a str,
    audience: &'a str,
    scope: String,
    requested_token_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
}

#[derive(Debug, Serialize)]
struct ImpersonateRequest<'a> {
    scope: &'a [String],
    lifetime: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImpersonateResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expireTime")]
    expire_time: String,
}

impl ExternalAccountTokenSource {
    pub fn descriptor(&self) -> &ExternalAccountDescriptor {
        &self.descriptor
    }

    async fn exchange_subject_token(&self, subject_token: &str) -> Result<AccessToken> {
        let sts_scope = if self.descriptor.service_account_impersonation_url.is_some() {
            IAM_SCOPE.to_string()
        } else {
            self.scopes.join(" ")
        };

        let sts_request = StsTokenRequest {
            grant_type: TOKEN_EXCHANGE_GRANT,
            audience: &self.descriptor.audience,
            scope: sts_scope,
            requested_token_type: ACCESS_TOKEN_TYPE,
            subject_token,
            subject_token_type: &self.descriptor.subject_token_type,
        };

        let sts_response = self
            .client
            .post(&self.descriptor.token_url)
            .json(&sts_request)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let sts_token = read_token_response(sts_response, "GCP STS", self.timeout).await?;
        Ok(sts_token.into_access_token())
    }

    async fn impersonate(&self, impersonation_url: &str, sts_token: &AccessToken) -> Result<AccessToken> {
        let impersonate_request = ImpersonateRequest {
            scope: &self.scopes,
            lifetime: "3600s",
        };

        let impersonate_response = self
            .client
            .post(impersonation_url)
            .bearer_auth(&sts_token.access_token)
            .json(&impersonate_request)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        if !impersonate_response.status().is_success() {
            let status = impersonate_response.status();
            let error_text = impersonate_response.text().await.unwrap_or_default();
            return Err(Error::Exchange(format!(
                "GCP impersonation returned {}: {}",
                status, error_text
            )));
        }

        let impersonated: ImpersonateResponse = impersonate_response
            .json()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let expiry = DateTime::parse_from_rfc3339(&impersonated.expire_time)
            .map(|dt| dt.with_timezone(&Utc))
            .ok();

        Ok(AccessToken::bearer(impersonated.access_token, expiry))
    }
}

#[async_trait]
impl TokenSource for ExternalAccountTokenSource {
    async fn token(&self, ctx: &CallContext) -> Result<AccessToken> {
        debug!(
            audience = %self.descriptor.audience,
            "Exchanging subject token for GCP credentials"
        );

        ctx.run(async {
            let subject_token = self.supplier.subject_token(ctx).await?;
            let sts_token = self.exchange_subject_token(&subject_token).await?;

            match &self.descriptor.service_account_impersonation_url {
                Some(url) => self.impersonate(url, &sts_token).await,
                None => Ok(sts_token),
            }
        })
        .await
    }
}
