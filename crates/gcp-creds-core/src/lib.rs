//! gcp-creds Core
//!
//! Core domain types, traits, and error handling for gcp-creds.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across the credential, secret-store and CLI crates.

pub mod call;
pub mod container;
pub mod error;
pub mod ports;
pub mod secrets;

pub use call::CallContext;
pub use container::{ExecutionContext, MountOptions, NewFile, RegistryLogin, SecretMount};
pub use error::{Error, Result};
pub use ports::SecretStore;
pub use secrets::{Secret, SecretValue};
