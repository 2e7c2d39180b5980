//! Execution context model.
//!
//! An [`ExecutionContext`] describes what should be injected into a container
//! before it runs: environment variables, plain files, mounted secrets and
//! registry logins. It is a value type; every `with_*` method returns the
//! modified context and leaves nothing shared behind, so callers can keep the
//! original around and discard the new one on failure.

use crate::secrets::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A plain file written into the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub contents: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u32>,
}

/// Ownership and permission bits for a mounted secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    /// A `user:group` to own the mounted secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Permission bits (e.g. `0o600`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// A secret mounted as a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMount {
    pub secret: Secret,
    #[serde(flatten)]
    pub options: MountOptions,
}

/// Credentials for authenticating against a container registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLogin {
    pub username: String,
    pub secret: Secret,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, NewFile>,
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretMount>,
    #[serde(default)]
    pub registry_auths: BTreeMap<String, RegistryLogin>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_new_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        let path = path.into();
        self.secrets.remove(&path);
        self.files.insert(
            path,
            NewFile {
                contents: contents.into(),
                permissions: None,
            },
        );
        self
    }

    pub fn with_mounted_secret(
        mut self,
        path: impl Into<String>,
        secret: Secret,
        options: MountOptions,
    ) -> Self {
        let path = path.into();
        self.files.remove(&path);
        self.secrets.insert(path, SecretMount { secret, options });
        self
    }

    pub fn with_registry_auth(
        mut self,
        address: impl Into<String>,
        username: impl Into<String>,
        secret: Secret,
    ) -> Self {
        self.registry_auths.insert(
            address.into(),
            RegistryLogin {
                username: username.into(),
                secret,
            },
        );
        self
    }

    pub fn env_variable(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.env.is_empty()
            && self.files.is_empty()
            && self.secrets.is_empty()
            && self.registry_auths.is_empty()
    }
}
