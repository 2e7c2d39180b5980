//! In-memory secret store.

use crate::source::SecretSource;
use async_trait::async_trait;
use gcp_creds_core::{Error, Result, Secret, SecretStore, SecretValue};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

enum Entry {
    Value(SecretValue),
    Sourced {
        source: SecretSource,
        last_loaded: Option<SecretValue>,
    },
}

impl Entry {
    /// The plaintext known to this entry, if any has been seen.
    fn known_value(&self) -> Option<&SecretValue> {
        match self {
            Entry::Value(value) => Some(value),
            Entry::Sourced { last_loaded, .. } => last_loaded.as_ref(),
        }
    }
}

/// Secret store scoped to a single process.
///
/// Entries are either fixed values (derived artifacts such as access tokens)
/// or live sources that are re-read on every [`SecretStore::plaintext`] call.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret whose plaintext is loaded from `source` on each read.
    pub async fn register_source(&self, name: &str, source: SecretSource) -> Secret {
        debug!(name = %name, source = %source, "Registering secret source");
        let mut entries = self.entries.write().await;
        entries.insert(
            name.to_string(),
            Entry::Sourced {
                source,
                last_loaded: None,
            },
        );
        Secret::new(name)
    }

    /// Names of all registered secrets, sorted.
    pub async fn names(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Mask a string by replacing stored secret values with asterisks.
    ///
    /// Sourced secrets are masked by the value they last loaded.
    pub async fn mask_string(&self, input: &str) -> String {
        let entries = self.entries.read().await;
        let mut output = input.to_string();

        for value in entries.values().filter_map(Entry::known_value) {
            let needle = value.value.trim();
            if value.masked && needle.len() > 3 {
                output = output.replace(needle, "***");
            }
        }

        output
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn set_secret(&self, name: &str, value: SecretValue) -> Result<Secret> {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), Entry::Value(value));
        debug!(name = %name, "Secret stored");
        Ok(Secret::new(name))
    }

    async fn plaintext(&self, secret: &Secret) -> Result<SecretValue> {
        let source = {
            let entries = self.entries.read().await;
            match entries.get(secret.name()) {
                Some(Entry::Value(value)) => return Ok(value.clone()),
                Some(Entry::Sourced { source, .. }) => source.clone(),
                None => return Err(Error::SecretNotFound(secret.name().to_string())),
            }
        };

        let value = source.load().await?;

        let mut entries = self.entries.write().await;
        if let Some(Entry::Sourced {
            source: current,
            last_loaded,
        }) = entries.get_mut(secret.name())
            && *current == source
        {
            *last_loaded = Some(value.clone());
        }

        Ok(value)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
