//! Credential origin selection.

use crate::config::CredentialConfig;
use gcp_creds_core::{Error, Result, Secret};

/// The credential origin chosen for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialInput {
    /// A JSON key stored as a secret.
    StaticKey(Secret),
    /// Workload identity federation: a provider plus the subject token to
    /// present to it.
    FederatedIdentity { provider: String, subject_token: Secret },
}

impl CredentialInput {
    /// Pick a credential origin.
    ///
    /// A static key wins whenever it is present, whatever else is set.
    /// Otherwise a subject token and a non-empty provider are both required.
    pub fn resolve(
        static_key: Option<Secret>,
        provider: &str,
        subject_token: Option<Secret>,
    ) -> Result<Self> {
        match (static_key, subject_token) {
            (Some(key), _) => Ok(CredentialInput::StaticKey(key)),
            (None, None) => Err(Error::Config(
                "no credentials or workload identity token specified".to_string(),
            )),
            (None, Some(_)) if provider.is_empty() => Err(Error::Config(
                "workload identity provider must be specified".to_string(),
            )),
            (None, Some(subject_token)) => Ok(CredentialInput::FederatedIdentity {
                provider: provider.to_string(),
                subject_token,
            }),
        }
    }

    pub fn from_config(config: &CredentialConfig) -> Result<Self> {
        Self::resolve(
            config.static_credential_key.clone(),
            &config.workload_identity_provider,
            config.workload_identity_token.clone(),
        )
    }

    pub fn is_federated(&self) -> bool {
        matches!(self, CredentialInput::FederatedIdentity { .. })
    }
}
