//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the credential core and external adapters.

use crate::Result;
use crate::secrets::{Secret, SecretValue};
use async_trait::async_trait;

/// Named secret storage.
///
/// Derived artifacts (access tokens, registry configs) are registered here
/// under deterministic names and handed out as [`Secret`] handles.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Register a secret under `name`, replacing any previous value.
    async fn set_secret(&self, name: &str, value: SecretValue) -> Result<Secret>;

    /// Resolve the current plaintext of a secret.
    async fn plaintext(&self, secret: &Secret) -> Result<SecretValue>;

    /// Store name for logging.
    fn name(&self) -> &str;
}
