//! Subject token suppliers for workload identity federation.

use crate::external_account::CredentialSourceFormat;
use async_trait::async_trait;
use gcp_creds_core::{CallContext, Error, Result, Secret, SecretStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Produces the external subject token presented to STS.
///
/// Called once per exchange, possibly more. Implementations must read the
/// live token material on every call and must not have side effects.
/// Surrounding whitespace is not part of a token.
#[async_trait]
pub trait SubjectTokenSupplier: Send + Sync {
    async fn subject_token(&self, ctx: &CallContext) -> Result<String>;
}

/// Reads the subject token from a secret store.
pub struct SecretTokenSupplier {
    store: Arc<dyn SecretStore>,
    secret: Secret,
}

impl SecretTokenSupplier {
    pub fn new(store: Arc<dyn SecretStore>, secret: Secret) -> Self {
        Self { store, secret }
    }
}

#[async_trait]
impl SubjectTokenSupplier for SecretTokenSupplier {
    async fn subject_token(&self, ctx: &CallContext) -> Result<String> {
        let value = ctx.run(self.store.plaintext(&self.secret)).await?;
        Ok(value.expose().trim().to_string())
    }
}

/// Reads the subject token from a file, as described by an external account
/// descriptor's `credential_source`.
pub struct FileTokenSupplier {
    path: PathBuf,
    format: CredentialSourceFormat,
}

impl FileTokenSupplier {
    pub fn new(path: impl Into<PathBuf>, format: CredentialSourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

#[async_trait]
impl SubjectTokenSupplier for FileTokenSupplier {
    async fn subject_token(&self, ctx: &CallContext) -> Result<String> {
        let contents = ctx
            .run(async { tokio::fs::read_to_string(&self.path).await.map_err(Error::from) })
            .await?;

        match &self.format {
            CredentialSourceFormat::Text => Ok(contents.trim().to_string()),
            CredentialSourceFormat::Json {
                subject_token_field_name,
            } => {
                let value: serde_json::Value = serde_json::from_str(&contents)?;
                value
                    .get(subject_token_field_name)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::InvalidCredentials(format!(
                            "{} is missing token field {}",
                            self.path.display(),
                            subject_token_field_name
                        ))
                    })
            }
        }
    }
}
