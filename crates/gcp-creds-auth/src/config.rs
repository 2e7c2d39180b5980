//! Configuration for credential resolution and token exchange.

use crate::CLOUD_PLATFORM_SCOPE;
use crate::external_account::STS_TOKEN_URL;
use gcp_creds_core::{Error, Result, Secret};
use std::time::Duration;

/// Credential material supplied once per invocation.
#[derive(Debug, Clone, Default)]
pub struct CredentialConfig {
    /// Service account (or other Google credential) JSON key.
    pub static_credential_key: Option<Secret>,
    /// Workload identity provider resource name, e.g.
    /// `//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/pool/providers/p`.
    pub workload_identity_provider: String,
    /// Subject token presented to the workload identity provider.
    pub workload_identity_token: Option<Secret>,
    /// Registry hosts to authenticate, in order.
    pub registries: Vec<String>,
}

impl CredentialConfig {
    pub fn with_static_key(mut self, key: Secret) -> Self {
        self.static_credential_key = Some(key);
        self
    }

    pub fn with_workload_identity(mut self, provider: impl Into<String>, token: Secret) -> Self {
        self.workload_identity_provider = provider.into();
        self.workload_identity_token = Some(token);
        self
    }

    pub fn with_registries(mut self, registries: Vec<String>) -> Self {
        self.registries = registries;
        self
    }
}

/// Endpoints and limits used when talking to Google.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// STS endpoint written into external account descriptors.
    pub sts_token_url: String,
    /// OAuth endpoint used to refresh `authorized_user` credentials.
    pub oauth_token_url: String,
    /// Scopes requested for every access token.
    pub scopes: Vec<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub universe_domain: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sts_token_url: STS_TOKEN_URL.to_string(),
            oauth_token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![CLOUD_PLATFORM_SCOPE.to_string()],
            request_timeout: Duration::from_secs(30),
            universe_domain: "googleapis.com".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn with_sts_token_url(mut self, url: impl Into<String>) -> Self {
        self.sts_token_url = url.into();
        self
    }

    pub fn with_oauth_token_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_token_url = url.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the HTTP client shared by all token sources created from this config.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert_eq!(config.sts_token_url, "https://sts.googleapis.com/v1/token");
        assert_eq!(config.scopes, vec![CLOUD_PLATFORM_SCOPE.to_string()]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_credential_config_builders() {
        let config = CredentialConfig::default()
            .with_workload_identity("//iam.googleapis.com/p", Secret::new("oidc"))
            .with_registries(vec!["gcr.io".to_string()]);

        assert!(config.static_credential_key.is_none());
        assert_eq!(config.workload_identity_provider, "//iam.googleapis.com/p");
        assert_eq!(config.registries, vec!["gcr.io".to_string()]);
    }
}
