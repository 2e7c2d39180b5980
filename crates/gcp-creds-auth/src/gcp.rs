//! Credential injection into execution contexts.

use crate::config::{AuthConfig, CredentialConfig};
use crate::external_account::{ExternalAccountDescriptor, SUBJECT_TOKEN_PATH};
use crate::registry::{REGISTRY_USERNAME, RegistryAuthDocument};
use crate::resolver::CredentialInput;
use crate::token::{AccessToken, TokenFormat, TokenSource, new_token_source};
use gcp_creds_core::{
    CallContext, ExecutionContext, MountOptions, Result, Secret, SecretStore, SecretValue,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Path of the application default credentials file inside an execution context.
pub const CREDENTIALS_PATH: &str = "/.gcp/credentials";

const ACCESS_TOKEN_SECRET: &str = "_gcp_access_token";
const JSON_ACCESS_TOKEN_SECRET: &str = "_gcp_json_access_token";

/// Google Cloud credentials for one invocation.
///
/// The credential origin is resolved once, in [`Gcp::new`]; every operation
/// afterwards works from that decision.
pub struct Gcp {
    input: CredentialInput,
    registries: Vec<String>,
    store: Arc<dyn SecretStore>,
    config: AuthConfig,
}

impl Gcp {
    pub fn new(
        credentials: CredentialConfig,
        store: Arc<dyn SecretStore>,
        config: AuthConfig,
    ) -> Result<Self> {
        let input = CredentialInput::from_config(&credentials)?;

        Ok(Self {
            input,
            registries: credentials.registries,
            store,
            config,
        })
    }

    pub fn input(&self) -> &CredentialInput {
        &self.input
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    /// The external account descriptor written into federated contexts.
    pub fn descriptor(&self, provider: &str) -> ExternalAccountDescriptor {
        ExternalAccountDescriptor::build(provider, SUBJECT_TOKEN_PATH)
            .with_token_url(&self.config.sts_token_url)
            .with_universe_domain(&self.config.universe_domain)
    }

    /// Expose the credentials as application default credentials.
    ///
    /// Sets `GOOGLE_APPLICATION_CREDENTIALS` and
    /// `CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE` to [`CREDENTIALS_PATH`], then
    /// either mounts the static key there, or writes an external account
    /// descriptor there and mounts the subject token at [`SUBJECT_TOKEN_PATH`].
    pub fn mount(&self, ctr: &ExecutionContext) -> Result<ExecutionContext> {
        let ctr = ctr
            .clone()
            .with_env_variable("GOOGLE_APPLICATION_CREDENTIALS", CREDENTIALS_PATH)
            .with_env_variable("CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE", CREDENTIALS_PATH);

        let ctr = match &self.input {
            CredentialInput::StaticKey(key) => {
                ctr.with_mounted_secret(CREDENTIALS_PATH, key.clone(), MountOptions::default())
            }
            CredentialInput::FederatedIdentity {
                provider,
                subject_token,
            } => {
                let descriptor = self.descriptor(provider).to_json()?;
                ctr.with_new_file(CREDENTIALS_PATH, descriptor)
                    .with_mounted_secret(
                        SUBJECT_TOKEN_PATH,
                        subject_token.clone(),
                        MountOptions::default(),
                    )
            }
        };

        debug!(federated = self.input.is_federated(), "Mounted credentials");
        Ok(ctr)
    }

    pub async fn token_source(&self, ctx: &CallContext) -> Result<Box<dyn TokenSource>> {
        new_token_source(ctx, &self.input, self.store.clone(), &self.config).await
    }

    /// Fetch a fresh access token.
    pub async fn access_token(&self, ctx: &CallContext) -> Result<AccessToken> {
        let source = self.token_source(ctx).await?;
        source.token(ctx).await
    }

    /// Fetch an access token and register it as a secret.
    ///
    /// `format` is `"text"` for the bare token or `"json"` for the token record.
    pub async fn get_access_token(&self, ctx: &CallContext, format: &str) -> Result<Secret> {
        let format: TokenFormat = format.parse()?;
        let token = self.access_token(ctx).await?;

        let name = match format {
            TokenFormat::Text => ACCESS_TOKEN_SECRET,
            TokenFormat::Json => JSON_ACCESS_TOKEN_SECRET,
        };

        self.store
            .set_secret(name, SecretValue::new(token.render(format)?))
            .await
    }

    /// Attach registry logins for every configured registry.
    pub async fn registry_auth(
        &self,
        ctx: &CallContext,
        ctr: &ExecutionContext,
    ) -> Result<ExecutionContext> {
        let token = self.get_access_token(ctx, "text").await?;

        Ok(self.registries.iter().fold(ctr.clone(), |c, registry| {
            debug!(registry = %registry, "Adding registry auth");
            c.with_registry_auth(registry, REGISTRY_USERNAME, token.clone())
        }))
    }

    /// Build the registry auth document for the configured registries.
    ///
    /// No token is fetched when there are no registries to authenticate.
    pub async fn registry_document(&self, ctx: &CallContext) -> Result<RegistryAuthDocument> {
        if self.registries.is_empty() {
            return Ok(RegistryAuthDocument::empty());
        }

        let token = self.access_token(ctx).await?;
        Ok(RegistryAuthDocument::encode(&self.registries, &token))
    }

    /// A registry credential file to be mounted at `path`.
    pub fn registry_config(
        &self,
        path: impl Into<String>,
        owner: Option<String>,
        mode: Option<u32>,
    ) -> RegistryConfig<'_> {
        RegistryConfig {
            path: path.into(),
            options: MountOptions { owner, mode },
            gcp: self,
        }
    }
}

/// A registry credential file bound to a mount path.
pub struct RegistryConfig<'a> {
    /// Path to mount the secret into (commonly `~/.docker/config.json`).
    pub path: String,
    pub options: MountOptions,
    gcp: &'a Gcp,
}

impl RegistryConfig<'_> {
    /// Register the document under its content-addressed name and mount it.
    pub async fn mount(&self, ctx: &CallContext, ctr: &ExecutionContext) -> Result<ExecutionContext> {
        let document = self.gcp.registry_document(ctx).await?;
        let name = document.secret_name()?;
        let secret = self
            .gcp
            .store
            .set_secret(&name, SecretValue::new(document.to_json()?))
            .await?;

        info!(path = %self.path, secret = %name, "Mounting registry config");
        Ok(ctr
            .clone()
            .with_mounted_secret(&self.path, secret, self.options.clone()))
    }
}
