//! Workload identity federation exchange tests against a fake STS.

mod common;

use common::{PROVIDER, config_for, store_with, token_response};
use gcp_creds_auth::{CredentialConfig, Gcp, SecretTokenSupplier, TokenSource, exchange};
use gcp_creds_auth::external_account::{ExternalAccountDescriptor, SUBJECT_TOKEN_PATH};
use gcp_creds_core::{CallContext, Error, ExecutionContext, SecretStore, SecretValue};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn federated(subject_token: gcp_creds_core::Secret) -> CredentialConfig {
    CredentialConfig::default()
        .with_workload_identity(PROVIDER, subject_token)
        .with_registries(vec!["us-docker.pkg.dev".to_string()])
}

#[tokio::test]
async fn test_federated_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(body_partial_json(json!({
            "grant_type": "urn:ietf:params:oauth:grant-type:token-exchange",
            "audience": PROVIDER,
            "scope": "https://www.googleapis.com/auth/cloud-platform",
            "requested_token_type": "urn:ietf:params:oauth:token-type:access_token",
            "subject_token": "abc",
            "subject_token_type": "urn:ietf:params:oauth:token-type:jwt",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("ya29.federated")))
        .expect(1)
        .mount(&server)
        .await;

    let (store, subject) = store_with("oidc", "abc").await;
    let gcp = Gcp::new(federated(subject), store.clone(), config_for(&server)).unwrap();

    let secret = gcp
        .get_access_token(&CallContext::new(), "text")
        .await
        .unwrap();

    assert_eq!(secret.name(), "_gcp_access_token");
    assert_eq!(store.plaintext(&secret).await.unwrap().expose(), "ya29.federated");
}

#[tokio::test]
async fn test_supplier_rereads_subject_token() {
    let server = MockServer::start().await;
    for (subject, access) in [("first", "ya29.one"), ("second", "ya29.two")] {
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .and(body_partial_json(json!({ "subject_token": subject })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(access)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (store, subject) = store_with("oidc", "first").await;
    let config = config_for(&server);
    let descriptor = ExternalAccountDescriptor::build(PROVIDER, SUBJECT_TOKEN_PATH)
        .with_token_url(&config.sts_token_url);
    let supplier = SecretTokenSupplier::new(store.clone(), subject);
    let source = exchange(descriptor, Arc::new(supplier), &config).unwrap();

    let ctx = CallContext::new();
    assert_eq!(source.token(&ctx).await.unwrap().access_token, "ya29.one");

    store
        .set_secret("oidc", SecretValue::new("second"))
        .await
        .unwrap();
    assert_eq!(source.token(&ctx).await.unwrap().access_token, "ya29.two");
}

#[tokio::test]
async fn test_rejected_audience_is_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_target",
            "error_description": "The target service indicated by the audience parameters is invalid.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (store, subject) = store_with("oidc", "abc").await;
    let gcp = Gcp::new(federated(subject), store.clone(), config_for(&server)).unwrap();

    let err = gcp
        .get_access_token(&CallContext::new(), "json")
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Exchange(msg) if msg.contains("400") && msg.contains("invalid_target")));
    assert_eq!(store.names().await, vec!["oidc".to_string()]);
}

#[tokio::test]
async fn test_cancelled_exchange_leaves_context_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("ya29.late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let (store, subject) = store_with("oidc", "abc").await;
    let gcp = Gcp::new(federated(subject), store.clone(), config_for(&server)).unwrap();

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let original = ExecutionContext::new().with_env_variable("CI", "true");
    let result = gcp.registry_auth(&ctx, &original).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(original, ExecutionContext::new().with_env_variable("CI", "true"));
    assert!(original.registry_auths.is_empty());
    assert_eq!(store.names().await, vec!["oidc".to_string()]);
}

#[tokio::test]
async fn test_exchange_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response("ya29.late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let (store, subject) = store_with("oidc", "abc").await;
    let gcp = Gcp::new(federated(subject), store, config_for(&server)).unwrap();

    let ctx = CallContext::new().with_timeout(Duration::from_millis(200));
    let result = gcp.access_token(&ctx).await;

    assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_millis(200)));
}

#[tokio::test]
async fn test_external_account_key_with_impersonation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(body_partial_json(json!({
            "subject_token": "file-token",
            "scope": "https://www.googleapis.com/auth/iam",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("sts-token")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/-/serviceAccounts/ci@p.iam.gserviceaccount.com:generateAccessToken",
        ))
        .and(header("authorization", "Bearer sts-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "ya29.impersonated",
            "expireTime": "2030-01-01T00:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    std::fs::write(&token_file, "file-token").unwrap();

    let key = json!({
        "type": "external_account",
        "audience": PROVIDER,
        "subject_token_type": "urn:ietf:params:oauth:token-type:jwt",
        "token_url": format!("{}/v1/token", server.uri()),
        "service_account_impersonation_url": format!(
            "{}/v1/projects/-/serviceAccounts/ci@p.iam.gserviceaccount.com:generateAccessToken",
            server.uri()
        ),
        "credential_source": {"file": token_file.to_string_lossy()},
    });

    let (store, key_secret) = store_with("key", &key.to_string()).await;
    let gcp = Gcp::new(
        CredentialConfig::default().with_static_key(key_secret),
        store,
        config_for(&server),
    )
    .unwrap();

    let token = gcp.access_token(&CallContext::new()).await.unwrap();
    assert_eq!(token.access_token, "ya29.impersonated");
    assert_eq!(
        token.expiry.map(|e| e.to_rfc3339()),
        Some("2030-01-01T00:00:00+00:00".to_string())
    );
}
