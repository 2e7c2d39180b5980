//! Token sources backed by a static credential key.

pub mod authorized_user;
pub mod service_account;

use crate::config::AuthConfig;
use crate::external_account::{ExternalAccountDescriptor, exchange};
use crate::supplier::FileTokenSupplier;
use crate::token::{AccessToken, TokenSource};
use chrono::Utc;
use gcp_creds_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub use authorized_user::{AuthorizedUserKey, AuthorizedUserTokenSource};
pub use service_account::{
    AssertionClaims, AssertionSigner, ServiceAccountKey, ServiceAccountTokenSource,
};

/// A parsed static credential key, discriminated by its `type` field.
#[derive(Debug, Clone)]
pub enum StaticKey {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
    ExternalAccount(ExternalAccountDescriptor),
}

impl StaticKey {
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            Error::InvalidCredentials(format!("credentials are not valid JSON: {}", e))
        })?;

        let key_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                Error::InvalidCredentials("credentials JSON has no type field".to_string())
            })?
            .to_string();

        let invalid = |e: serde_json::Error| {
            Error::InvalidCredentials(format!("malformed {} credentials: {}", key_type, e))
        };

        match key_type.as_str() {
            "service_account" => serde_json::from_value(value)
                .map(StaticKey::ServiceAccount)
                .map_err(invalid),
            "authorized_user" => serde_json::from_value(value)
                .map(StaticKey::AuthorizedUser)
                .map_err(invalid),
            "external_account" => serde_json::from_value(value)
                .map(StaticKey::ExternalAccount)
                .map_err(invalid),
            other => Err(Error::InvalidCredentials(format!(
                "unsupported credential type: {}",
                other
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StaticKey::ServiceAccount(_) => "service_account",
            StaticKey::AuthorizedUser(_) => "authorized_user",
            StaticKey::ExternalAccount(_) => "external_account",
        }
    }

    pub fn into_token_source(self, config: &AuthConfig) -> Result<Box<dyn TokenSource>> {
        match self {
            StaticKey::ServiceAccount(key) => {
                Ok(Box::new(ServiceAccountTokenSource::new(key, config)?))
            }
            StaticKey::AuthorizedUser(key) => {
                Ok(Box::new(AuthorizedUserTokenSource::new(key, config)?))
            }
            StaticKey::ExternalAccount(descriptor) => {
                let source = &descriptor.credential_source;
                let supplier = FileTokenSupplier::new(&source.file, source.format.clone());
                Ok(Box::new(exchange(descriptor, Arc::new(supplier), config)?))
            }
        }
    }
}

/// Successful response of an OAuth 2.0 / STS token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenEndpointResponse {
    pub(crate) fn into_access_token(self) -> AccessToken {
        AccessToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

pub(crate) fn http_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        Error::Exchange(format!("HTTP request failed: {}", err))
    }
}

/// Check the status of a token endpoint response and decode its body.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
    endpoint: &str,
    timeout: Duration,
) -> Result<TokenEndpointResponse> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Exchange(format!(
            "{} returned {}: {}",
            endpoint, status, error_text
        )));
    }

    response.json().await.map_err(|e| http_error(e, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_rejected() {
        let err = StaticKey::from_json(r#"{"type": "impersonated_service_account"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(msg) if msg.contains("impersonated")));
    }

    #[test]
    fn test_missing_type_rejected() {
        assert!(matches!(
            StaticKey::from_json(r#"{"client_email": "a@b"}"#),
            Err(Error::InvalidCredentials(_))
        ));
        assert!(matches!(
            StaticKey::from_json("not json"),
            Err(Error::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_authorized_user_parsed() {
        let key = StaticKey::from_json(
            r#"{"type": "authorized_user", "client_id": "id", "client_secret": "s", "refresh_token": "r"}"#,
        )
        .unwrap();
        assert_eq!(key.kind(), "authorized_user");
    }

    #[test]
    fn test_external_account_parsed() {
        let key = StaticKey::from_json(
            r#"{
                "type": "external_account",
                "audience": "//iam.googleapis.com/projects/1/locations/global/workloadIdentityPools/p/providers/x",
                "subject_token_type": "urn:ietf:params:oauth:token-type:jwt",
                "token_url": "https://sts.googleapis.com/v1/token",
                "credential_source": {"file": "/var/run/token"}
            }"#,
        )
        .unwrap();

        match key {
            StaticKey::ExternalAccount(descriptor) => {
                assert_eq!(descriptor.credential_source.file, "/var/run/token");
                assert_eq!(descriptor.universe_domain, "googleapis.com");
            }
            other => panic!("unexpected key {:?}", other.kind()),
        }
    }

    #[test]
    fn test_service_account_missing_fields() {
        let err = StaticKey::from_json(r#"{"type": "service_account"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(msg) if msg.contains("service_account")));
    }
}
