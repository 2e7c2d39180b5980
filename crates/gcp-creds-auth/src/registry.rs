//! Container registry credential documents.

use crate::token::AccessToken;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gcp_creds_core::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Username Google registries expect alongside an OAuth access token.
pub const REGISTRY_USERNAME: &str = "oauth2accesstoken";

const SECRET_NAME_PREFIX: &str = "_gcp_registry_config_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub auth: String,
}

/// A registry credential file (`~/.docker/config.json` layout).
///
/// Hosts are kept sorted so the serialized form depends only on content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuthDocument {
    pub auths: BTreeMap<String, RegistryAuth>,
}

impl RegistryAuthDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a document granting `token` on every host in `registries`.
    pub fn encode<I, S>(registries: I, token: &AccessToken) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let auth = STANDARD.encode(format!("{}:{}", REGISTRY_USERNAME, token.access_token));
        let auths = registries
            .into_iter()
            .map(|registry| (registry.as_ref().to_string(), RegistryAuth { auth: auth.clone() }))
            .collect();

        Self { auths }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Hex SHA-256 of the serialized document.
    pub fn content_address(&self) -> Result<String> {
        let serialized = self.to_json()?;
        Ok(hex::encode(Sha256::digest(serialized.as_bytes())))
    }

    /// Secret name derived from the document's content address.
    pub fn secret_name(&self) -> Result<String> {
        Ok(format!("{}{}", SECRET_NAME_PREFIX, self.content_address()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(value: &str) -> AccessToken {
        AccessToken::bearer(value, None)
    }

    #[test]
    fn test_encode_document() {
        let doc = RegistryAuthDocument::encode(["us-docker.pkg.dev"], &token("TOKEN"));

        // base64("oauth2accesstoken:TOKEN")
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{"auths":{"us-docker.pkg.dev":{"auth":"b2F1dGgyYWNjZXNzdG9rZW46VE9LRU4="}}}"#
        );
    }

    #[test]
    fn test_empty_registries() {
        let doc = RegistryAuthDocument::encode(Vec::<String>::new(), &token("TOKEN"));
        assert_eq!(doc, RegistryAuthDocument::empty());
        assert_eq!(doc.to_json().unwrap(), r#"{"auths":{}}"#);
        assert!(doc.secret_name().unwrap().starts_with("_gcp_registry_config_"));
    }

    #[test]
    fn test_deterministic_identity() {
        let registries = ["gcr.io", "europe-docker.pkg.dev", "us-docker.pkg.dev"];
        let a = RegistryAuthDocument::encode(registries, &token("abc"));
        let b = RegistryAuthDocument::encode(registries.iter().rev(), &token("abc"));

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.secret_name().unwrap(), b.secret_name().unwrap());
        assert_eq!(a.content_address().unwrap().len(), 64);

        let c = RegistryAuthDocument::encode(registries, &token("other"));
        assert_ne!(a.secret_name().unwrap(), c.secret_name().unwrap());
    }

    #[test]
    fn test_duplicate_hosts_collapse() {
        let doc = RegistryAuthDocument::encode(["gcr.io", "gcr.io"], &token("abc"));
        assert_eq!(doc.auths.len(), 1);
    }
}
