//! Secret sources addressed by URI.

use gcp_creds_core::{Error, Result, SecretValue};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where the plaintext of an input secret lives.
///
/// Parsed from `env:NAME`, `file:PATH` or `literal:VALUE`. A string without a
/// recognised scheme is treated as a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    Env(String),
    File(PathBuf),
    Literal(String),
}

impl SecretSource {
    /// Read the current plaintext. Every call goes back to the source.
    pub async fn load(&self) -> Result<SecretValue> {
        match self {
            SecretSource::Env(name) => std::env::var(name)
                .map(SecretValue::new)
                .map_err(|_| Error::SecretNotFound(format!("env:{}", name))),
            SecretSource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(contents) => Ok(SecretValue::new(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(Error::SecretNotFound(format!("file:{}", path.display())))
                }
                Err(e) => Err(Error::Io(e)),
            },
            SecretSource::Literal(value) => Ok(SecretValue::new(value.clone())),
        }
    }
}

impl FromStr for SecretSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let source = if let Some(name) = s.strip_prefix("env:") {
            SecretSource::Env(name.to_string())
        } else if let Some(path) = s.strip_prefix("file:") {
            SecretSource::File(PathBuf::from(path))
        } else if let Some(value) = s.strip_prefix("literal:") {
            SecretSource::Literal(value.to_string())
        } else {
            SecretSource::File(PathBuf::from(s))
        };

        match &source {
            SecretSource::Env(name) if name.is_empty() => {
                Err(Error::Config(format!("empty secret source: {}", s)))
            }
            SecretSource::File(path) if path.as_os_str().is_empty() => {
                Err(Error::Config(format!("empty secret source: {}", s)))
            }
            _ => Ok(source),
        }
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Env(name) => write!(f, "env:{}", name),
            SecretSource::File(path) => write!(f, "file:{}", path.display()),
            SecretSource::Literal(_) => write!(f, "literal:***"),
        }
    }
}
