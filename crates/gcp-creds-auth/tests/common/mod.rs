//! Shared fixtures for gcp-creds-auth integration tests.

#![allow(dead_code)]

use gcp_creds_auth::AuthConfig;
use gcp_creds_core::{Secret, SecretStore, SecretValue};
use gcp_creds_secrets::MemorySecretStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

/// Throwaway RSA key used only to sign test assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_key.pem");

pub const PROVIDER: &str =
    "//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/ci/providers/p";

pub fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "ci@test-project.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri,
    })
    .to_string()
}

pub fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig::default()
        .with_sts_token_url(format!("{}/v1/token", server.uri()))
        .with_oauth_token_url(format!("{}/token", server.uri()))
        .with_request_timeout(Duration::from_secs(5))
}

pub async fn store_with(name: &str, value: &str) -> (Arc<MemorySecretStore>, Secret) {
    let store = Arc::new(MemorySecretStore::new());
    let secret = store
        .set_secret(name, SecretValue::new(value))
        .await
        .expect("store secret");
    (store, secret)
}

pub fn token_response(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3599,
    })
}
