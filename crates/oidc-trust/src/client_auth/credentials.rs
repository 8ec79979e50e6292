//! Registered client credentials lookup

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tracing::debug;

use super::method::ClientAuthMethod;
use crate::error::ErrorKind;
use crate::identifier::ClientId;
use crate::jose::JoseHeader;
use crate::keys::{JwkMatcher, KeyConversion, VerificationKey};
use crate::secret::Secret;

/// The credential store could not be consulted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("client credentials lookup failed: {0}")]
pub struct CredentialLookupError(pub String);

impl CredentialLookupError {
    /// Lookup failures are [`ErrorKind::Network`]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Network
    }
}

/// Credentials registered for clients
///
/// Implementations only ever return credentials bound to the client ID they
/// are asked about. An unknown client yields no credentials, not an error.
#[async_trait]
pub trait ClientCredentialsSelector: Send + Sync + std::fmt::Debug {
    /// Secrets registered for `client_id`, for the given method
    async fn select_client_secrets(
        &self,
        client_id: &ClientId,
        method: ClientAuthMethod,
    ) -> Result<Vec<Secret>, CredentialLookupError>;

    /// Public keys registered for `client_id` that may verify a JWS with
    /// `alg` and `header`
    async fn select_public_keys(
        &self,
        client_id: &ClientId,
        alg: Algorithm,
        header: &JoseHeader,
    ) -> Result<Vec<VerificationKey>, CredentialLookupError>;
}

/// A client's registered credentials
#[derive(Debug, Clone, Default)]
pub struct RegisteredClient {
    /// `client_secret`
    pub secret: Option<Secret>,
    /// Registered `jwks`
    pub jwks: Option<JwkSet>,
}

/// Fixed in-memory registry of client credentials
#[derive(Debug, Clone, Default)]
pub struct StaticClientCredentials {
    clients: HashMap<ClientId, RegisteredClient>,
}

impl StaticClientCredentials {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client secret
    #[must_use]
    pub fn with_secret(mut self, client_id: ClientId, secret: Secret) -> Self {
        self.clients.entry(client_id).or_default().secret = Some(secret);
        self
    }

    /// Register a client JWK set
    #[must_use]
    pub fn with_jwks(mut self, client_id: ClientId, jwks: JwkSet) -> Self {
        self.clients.entry(client_id).or_default().jwks = Some(jwks);
        self
    }

    /// Registered credentials of `client_id`
    pub fn get(&self, client_id: &ClientId) -> Option<&RegisteredClient> {
        self.clients.get(client_id)
    }
}

#[async_trait]
impl ClientCredentialsSelector for StaticClientCredentials {
    async fn select_client_secrets(
        &self,
        client_id: &ClientId,
        method: ClientAuthMethod,
    ) -> Result<Vec<Secret>, CredentialLookupError> {
        if !method.uses_shared_secret() {
            return Ok(Vec::new());
        }
        Ok(self
            .clients
            .get(client_id)
            .and_then(|client| client.secret.clone())
            .into_iter()
            .collect())
    }

    async fn select_public_keys(
        &self,
        client_id: &ClientId,
        alg: Algorithm,
        header: &JoseHeader,
    ) -> Result<Vec<VerificationKey>, CredentialLookupError> {
        let Some(jwks) = self.clients.get(client_id).and_then(|c| c.jwks.as_ref()) else {
            return Ok(Vec::new());
        };
        let matched = JwkMatcher::for_jws(alg, header).filter(&jwks.keys);
        let conversion = KeyConversion::from_jwks(&matched);
        for skipped in &conversion.skipped {
            debug!(client_id = %client_id, %skipped, "Skipped client JWK");
        }
        Ok(conversion.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwks() -> JwkSet {
        serde_json::from_value(serde_json::json!({
            "keys": [{
                "kty": "EC",
                "crv": "P-256",
                "kid": "ec-1",
                "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
                "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_secrets_bound_to_client() {
        let id = ClientId::new("123").unwrap();
        let store = StaticClientCredentials::new().with_secret(id.clone(), Secret::new("s3cret"));

        let secrets = store
            .select_client_secrets(&id, ClientAuthMethod::ClientSecretBasic)
            .await
            .unwrap();
        assert_eq!(secrets, vec![Secret::new("s3cret")]);

        let other = ClientId::new("456").unwrap();
        assert!(store
            .select_client_secrets(&other, ClientAuthMethod::ClientSecretBasic)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .select_client_secrets(&id, ClientAuthMethod::PrivateKeyJwt)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_public_keys_filtered_by_algorithm() {
        let id = ClientId::new("123").unwrap();
        let store = StaticClientCredentials::new().with_jwks(id.clone(), jwks());

        let keys = store
            .select_public_keys(&id, Algorithm::ES256, &JoseHeader::new("ES256"))
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id(), Some("ec-1"));

        let keys = store
            .select_public_keys(&id, Algorithm::RS256, &JoseHeader::new("RS256"))
            .await
            .unwrap();
        assert!(keys.is_empty());
    }
}
