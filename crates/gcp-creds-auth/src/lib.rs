//! Google Cloud credential resolution for gcp-creds.
//!
//! This crate turns one of two credential shapes (a static key or a workload
//! identity federation provider plus subject token) into scoped access
//! tokens, and injects them into an execution context as application default
//! credentials or container registry logins.

pub mod config;
pub mod external_account;
pub mod gcp;
pub mod providers;
pub mod registry;
pub mod resolver;
pub mod supplier;
pub mod token;

pub use config::{AuthConfig, CredentialConfig};
pub use external_account::{
    CredentialSource, CredentialSourceFormat, ExternalAccountDescriptor,
    ExternalAccountTokenSource, exchange,
};
pub use gcp::{Gcp, RegistryConfig};
pub use registry::{RegistryAuth, RegistryAuthDocument};
pub use resolver::CredentialInput;
pub use supplier::{FileTokenSupplier, SecretTokenSupplier, SubjectTokenSupplier};
pub use token::{AccessToken, TokenFormat, TokenSource, new_token_source};

/// OAuth scope granting access to all Google Cloud APIs.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
