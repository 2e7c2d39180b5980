//! CLI configuration management.

use crate::commands::CredentialArgs;
use anyhow::Context;
use gcp_creds_auth::{AuthConfig, CredentialConfig, Gcp};
use gcp_creds_secrets::{MemorySecretStore, SecretSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const CREDENTIALS_SECRET: &str = "gcp_credentials";
const WORKLOAD_IDENTITY_TOKEN_SECRET: &str = "gcp_workload_identity_token";

/// CLI configuration, read from YAML and overridden by flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Static credential key source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_identity_provider: Option<String>,
    /// Subject token source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_identity_token: Option<String>,
    #[serde(default)]
    pub registries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sts_token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Timeout in seconds for network operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CliConfig {
    /// Load configuration from `path`, or from the default location if it exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Get the default configuration file path.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "gcp-creds", "gcp-creds")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Apply flag values over the file values.
    pub fn merge(mut self, args: &CredentialArgs, timeout: Option<u64>) -> Self {
        if args.credentials.is_some() {
            self.credentials = args.credentials.clone();
        }
        if args.workload_identity_provider.is_some() {
            self.workload_identity_provider = args.workload_identity_provider.clone();
        }
        if args.workload_identity_token.is_some() {
            self.workload_identity_token = args.workload_identity_token.clone();
        }
        if !args.registries.is_empty() {
            self.registries = args.registries.clone();
        }
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig::default();
        if let Some(url) = &self.sts_token_url {
            config = config.with_sts_token_url(url);
        }
        if let Some(url) = &self.oauth_token_url {
            config = config.with_oauth_token_url(url);
        }
        if !self.scopes.is_empty() {
            config = config.with_scopes(self.scopes.clone());
        }
        if let Some(timeout) = self.timeout() {
            config = config.with_request_timeout(timeout);
        }
        config
    }

    /// Register the configured secret sources and build the credential inputs.
    pub async fn credential_config(
        &self,
        store: &MemorySecretStore,
    ) -> anyhow::Result<CredentialConfig> {
        let mut credentials = CredentialConfig::default().with_registries(self.registries.clone());

        if let Some(source) = &self.credentials {
            let source: SecretSource = source.parse()?;
            let key = store.register_source(CREDENTIALS_SECRET, source).await;
            credentials = credentials.with_static_key(key);
        }

        credentials.workload_identity_provider =
            self.workload_identity_provider.clone().unwrap_or_default();
        if let Some(source) = &self.workload_identity_token {
            let source: SecretSource = source.parse()?;
            credentials.workload_identity_token =
                Some(store.register_source(WORKLOAD_IDENTITY_TOKEN_SECRET, source).await);
        }

        Ok(credentials)
    }

    pub async fn gcp(&self, store: Arc<MemorySecretStore>) -> anyhow::Result<Gcp> {
        let credentials = self.credential_config(&store).await?;
        Ok(Gcp::new(credentials, store, self.auth_config())?)
    }

    /// A copy safe to print: literal secret values are hidden.
    pub fn redacted(&self) -> Self {
        let redact = |value: &Option<String>| {
            value.as_ref().map(|v| match v.parse::<SecretSource>() {
                Ok(source) => source.to_string(),
                Err(_) => v.clone(),
            })
        };

        Self {
            credentials: redact(&self.credentials),
            workload_identity_token: redact(&self.workload_identity_token),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcp_creds_core::{Secret, SecretStore};
    use pretty_assertions::assert_eq;

    const YAML: &str = r#"
workload_identity_provider: //iam.googleapis.com/projects/1/locations/global/workloadIdentityPools/ci/providers/gh
workload_identity_token: env:CI_OIDC_TOKEN
registries:
  - us-docker.pkg.dev
timeout: 10
"#;

    #[test]
    fn test_parse_yaml() {
        let config = CliConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.registries, vec!["us-docker.pkg.dev".to_string()]);
        assert_eq!(config.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.credentials, None);
        assert_eq!(config.auth_config().request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_flags_override_file() {
        let args = CredentialArgs {
            workload_identity_token: Some("file:/var/run/token".to_string()),
            registries: vec!["gcr.io".to_string(), "europe-docker.pkg.dev".to_string()],
            ..Default::default()
        };

        let config = CliConfig::from_yaml(YAML).unwrap().merge(&args, Some(3));

        assert_eq!(
            config.workload_identity_token.as_deref(),
            Some("file:/var/run/token")
        );
        assert_eq!(config.registries.len(), 2);
        assert_eq!(config.timeout, Some(3));
        assert!(config.workload_identity_provider.is_some());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CliConfig::load(Some(&dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config, CliConfig::from_yaml(YAML).unwrap());
    }

    #[test]
    fn test_redacted_hides_literals() {
        let config = CliConfig {
            credentials: Some("literal:{\"type\":\"service_account\"}".to_string()),
            workload_identity_token: Some("env:TOKEN".to_string()),
            ..Default::default()
        };

        let redacted = config.redacted();
        assert_eq!(redacted.credentials.as_deref(), Some("literal:***"));
        assert_eq!(redacted.workload_identity_token.as_deref(), Some("env:TOKEN"));
    }

    #[tokio::test]
    async fn test_credential_config_registers_sources() {
        let store = MemorySecretStore::new();
        let config = CliConfig {
            credentials: Some("literal:key-json".to_string()),
            ..Default::default()
        };

        let credentials = config.credential_config(&store).await.unwrap();

        let key = credentials.static_credential_key.unwrap();
        assert_eq!(key, Secret::new(CREDENTIALS_SECRET));
        assert_eq!(store.plaintext(&key).await.unwrap().expose(), "key-json");
        assert!(credentials.workload_identity_token.is_none());
    }

    #[tokio::test]
    async fn test_gcp_requires_credentials() {
        let store = Arc::new(MemorySecretStore::new());
        assert!(CliConfig::default().gcp(store).await.is_err());
    }
}
