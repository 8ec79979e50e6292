//! JWK set sources

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::matcher::JwkMatcher;
use crate::error::ErrorKind;
use crate::retrieval::RetrieveError;

/// Failure to obtain a JWK set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySourceError {
    /// The document could not be retrieved
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    /// The document is not a JWK set
    #[error("invalid JWK set: {0}")]
    InvalidJwkSet(String),

    /// No JWK set has been fetched yet and the last attempt failed
    #[error("JWK set not available")]
    Unavailable,
}

impl KeySourceError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Retrieve(e) => e.kind(),
            Self::InvalidJwkSet(_) => ErrorKind::Structural,
            Self::Unavailable => ErrorKind::Network,
        }
    }
}

/// Source of JWKs for one key owner (an issuer or a client)
#[async_trait]
pub trait JwkSetSource: Send + Sync + std::fmt::Debug {
    /// Every JWK matching `matcher`
    async fn get(&self, matcher: &JwkMatcher) -> Result<Vec<Jwk>, KeySourceError>;
}

/// Immutable in-memory JWK set
#[derive(Debug, Clone)]
pub struct StaticJwkSet {
    jwks: JwkSet,
}

impl StaticJwkSet {
    /// Wrap a JWK set
    pub fn new(jwks: JwkSet) -> Self {
        Self { jwks }
    }

    /// Parse a JWK set document, skipping keys that cannot be parsed
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::InvalidJwkSet`] if the document is not a
    /// JSON object with a `keys` array.
    pub fn parse(json: &str) -> Result<Self, KeySourceError> {
        parse_jwk_set(json.as_bytes()).map(Self::new)
    }

    /// The wrapped JWK set
    pub fn jwk_set(&self) -> &JwkSet {
        &self.jwks
    }
}

#[async_trait]
impl JwkSetSource for StaticJwkSet {
    async fn get(&self, matcher: &JwkMatcher) -> Result<Vec<Jwk>, KeySourceError> {
        Ok(matcher.filter(&self.jwks.keys))
    }
}

/// Parse a JWK set, keeping every key that parses on its own
///
/// One malformed or unsupported key (an unknown `kty` or `alg`, say) would
/// fail a whole-document parse; here it is skipped instead.
pub(crate) fn parse_jwk_set(bytes: &[u8]) -> Result<JwkSet, KeySourceError> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| KeySourceError::InvalidJwkSet(e.to_string()))?;
    let keys = document
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| KeySourceError::InvalidJwkSet("missing keys array".to_string()))?;

    let mut parsed = Vec::with_capacity(keys.len());
    for key in keys {
        match serde_json::from_value::<Jwk>(key.clone()) {
            Ok(jwk) => parsed.push(jwk),
            Err(e) => debug!(
                kid = key.get("kid").and_then(serde_json::Value::as_str).unwrap_or_default(),
                error = %e,
                "Skipping unparsable JWK"
            ),
        }
    }
    Ok(JwkSet { keys: parsed })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"keys":[
        {"kty":"EC","crv":"P-256","kid":"ec","x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4","y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"},
        {"kty":"XYZ","kid":"weird"}
    ]}"#;

    #[test]
    fn test_unparsable_keys_skipped() {
        let set = StaticJwkSet::parse(DOC).unwrap();
        assert_eq!(set.jwk_set().keys.len(), 1);
    }

    #[test]
    fn test_missing_keys_array() {
        assert!(matches!(
            StaticJwkSet::parse(r#"{"kty":"EC"}"#),
            Err(KeySourceError::InvalidJwkSet(_))
        ));
        assert!(StaticJwkSet::parse("not json").is_err());
    }

    #[tokio::test]
    async fn test_static_source_filters() {
        let set = StaticJwkSet::parse(DOC).unwrap();
        let matcher = JwkMatcher::any().key_id("ec");
        assert_eq!(set.get(&matcher).await.unwrap().len(), 1);
        let matcher = JwkMatcher::any().key_id("other");
        assert!(set.get(&matcher).await.unwrap().is_empty());
    }
}
