//! Secret types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a secret registered in a [`SecretStore`](crate::ports::SecretStore).
///
/// The handle only carries the name; the plaintext is resolved through the
/// store every time it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret {
    name: String,
}

impl Secret {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}", self.name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub value: String,
    pub masked: bool,
}

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            masked: true,
        }
    }

    pub fn unmasked(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            masked: false,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.masked { "***" } else { self.value.as_str() };
        f.debug_struct("SecretValue")
            .field("value", &value)
            .field("masked", &self.masked)
            .finish()
    }
}
