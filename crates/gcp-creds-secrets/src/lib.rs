//! Secret store adapters for gcp-creds.

pub mod memory;
pub mod source;

pub use memory::MemorySecretStore;
pub use source::SecretSource;
