//! Native key material produced by key selectors
//!
//! JWKs are converted into [`VerificationKey`]s for JWS and used as-is for
//! nothing else: JWE decryption keys are always local ([`DecryptionKey`]).

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretVec};
use thiserror::Error;

use crate::jose::{EncryptionMethod, JwsFamily};
use crate::secret::Secret;

/// A JWK or PEM document that could not be turned into a native key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key {key_id:?} skipped: {reason}")]
pub struct SkippedKey {
    /// Key ID of the skipped key, if it had one
    pub key_id: Option<String>,
    /// Why conversion failed
    pub reason: String,
}

/// Public (or shared HMAC) key a JWS signature is checked against
#[derive(Clone)]
pub struct VerificationKey {
    key_id: Option<String>,
    family: JwsFamily,
    key: DecodingKey,
}

impl VerificationKey {
    /// Convert a public JWK
    ///
    /// # Errors
    ///
    /// Returns a [`SkippedKey`] when the JWK parameters are not a valid key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, SkippedKey> {
        let key_id = jwk.common.key_id.clone();
        let family = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => JwsFamily::Rsa,
            AlgorithmParameters::EllipticCurve(_) => JwsFamily::Ec,
            AlgorithmParameters::OctetKeyPair(_) => JwsFamily::Okp,
            AlgorithmParameters::OctetKey(_) => JwsFamily::Hmac,
        };
        let key = DecodingKey::from_jwk(jwk).map_err(|e| SkippedKey {
            key_id: key_id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            key_id,
            family,
            key,
        })
    }

    /// HMAC key from shared secret bytes
    pub fn from_secret(secret: &Secret) -> Self {
        Self {
            key_id: None,
            family: JwsFamily::Hmac,
            key: DecodingKey::from_secret(secret.expose_bytes()),
        }
    }

    /// RSA public key from a PEM document
    ///
    /// # Errors
    ///
    /// Returns a [`SkippedKey`] when the PEM is not an RSA public key.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, SkippedKey> {
        DecodingKey::from_rsa_pem(pem)
            .map(|key| Self {
                key_id: None,
                family: JwsFamily::Rsa,
                key,
            })
            .map_err(|e| SkippedKey {
                key_id: None,
                reason: e.to_string(),
            })
    }

    /// EC public key from a PEM document
    ///
    /// # Errors
    ///
    /// Returns a [`SkippedKey`] when the PEM is not an EC public key.
    pub fn from_ec_pem(pem: &[u8]) -> Result<Self, SkippedKey> {
        DecodingKey::from_ec_pem(pem)
            .map(|key| Self {
                key_id: None,
                family: JwsFamily::Ec,
                key,
            })
            .map_err(|e| SkippedKey {
                key_id: None,
                reason: e.to_string(),
            })
    }

    /// Attach a key ID
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Key ID, if known
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Key family
    pub fn family(&self) -> JwsFamily {
        self.family
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// Result of converting a batch of JWKs, keeping track of what was skipped
#[derive(Debug, Clone, Default)]
pub struct KeyConversion {
    /// Successfully converted keys, in input order
    pub keys: Vec<VerificationKey>,
    /// Keys that could not be converted
    pub skipped: Vec<SkippedKey>,
}

impl KeyConversion {
    /// Convert every JWK, collecting failures instead of aborting
    pub fn from_jwks<'a>(jwks: impl IntoIterator<Item = &'a Jwk>) -> Self {
        let mut conversion = Self::default();
        for jwk in jwks {
            match VerificationKey::from_jwk(jwk) {
                Ok(key) => conversion.keys.push(key),
                Err(skipped) => conversion.skipped.push(skipped),
            }
        }
        conversion
    }

    /// Convert every key of a JWK set
    pub fn from_jwk_set(set: &JwkSet) -> Self {
        Self::from_jwks(&set.keys)
    }
}

/// Private or shared key a JWE is decrypted with
#[derive(Clone)]
pub enum DecryptionKey {
    /// RSA private key for `RSA-OAEP-256`
    Rsa {
        /// Key ID, matched against the JWE `kid`
        key_id: Option<String>,
        /// Private key
        key: Arc<RsaPrivateKey>,
    },
    /// Content encryption key for `dir`
    Symmetric {
        /// Key ID, matched against the JWE `kid`
        key_id: Option<String>,
        /// Raw key bytes
        key: Arc<SecretVec<u8>>,
    },
}

impl DecryptionKey {
    /// RSA private key
    pub fn rsa(key: RsaPrivateKey) -> Self {
        Self::Rsa {
            key_id: None,
            key: Arc::new(key),
        }
    }

    /// Direct symmetric key
    pub fn symmetric(key: impl Into<Vec<u8>>) -> Self {
        Self::Symmetric {
            key_id: None,
            key: Arc::new(SecretVec::new(key.into())),
        }
    }

    /// `dir` key derived from a client secret for the given content encryption
    pub fn from_client_secret(secret: &Secret, enc: EncryptionMethod) -> Self {
        Self::Symmetric {
            key_id: None,
            key: Arc::new(secret.derive_encryption_key(enc)),
        }
    }

    /// Attach a key ID
    #[must_use]
    pub fn with_key_id(self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match self {
            Self::Rsa { key, .. } => Self::Rsa { key_id: id, key },
            Self::Symmetric { key, .. } => Self::Symmetric { key_id: id, key },
        }
    }

    /// Key ID, if known
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::Rsa { key_id, .. } | Self::Symmetric { key_id, .. } => key_id.as_deref(),
        }
    }

    pub(crate) fn symmetric_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Symmetric { key, .. } => Some(key.expose_secret().as_slice()),
            Self::Rsa { .. } => None,
        }
    }
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Rsa { .. } => "rsa",
            Self::Symmetric { .. } => "symmetric",
        };
        f.debug_struct("DecryptionKey")
            .field("kind", &kind)
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

/// Recipient key a JWE is encrypted to
#[derive(Clone)]
pub enum EncryptionKey {
    /// RSA public key for `RSA-OAEP-256`
    Rsa {
        /// Key ID placed in the JWE header
        key_id: Option<String>,
        /// Public key
        key: Arc<RsaPublicKey>,
    },
    /// Content encryption key for `dir`
    Symmetric {
        /// Key ID placed in the JWE header
        key_id: Option<String>,
        /// Raw key bytes
        key: Arc<SecretVec<u8>>,
    },
}

impl EncryptionKey {
    /// RSA public key
    pub fn rsa(key: RsaPublicKey) -> Self {
        Self::Rsa {
            key_id: None,
            key: Arc::new(key),
        }
    }

    /// Direct symmetric key
    pub fn symmetric(key: impl Into<Vec<u8>>) -> Self {
        Self::Symmetric {
            key_id: None,
            key: Arc::new(SecretVec::new(key.into())),
        }
    }

    /// `dir` key derived from a client secret for the given content encryption
    pub fn from_client_secret(secret: &Secret, enc: EncryptionMethod) -> Self {
        Self::Symmetric {
            key_id: None,
            key: Arc::new(secret.derive_encryption_key(enc)),
        }
    }

    /// Attach a key ID
    #[must_use]
    pub fn with_key_id(self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match self {
            Self::Rsa { key, .. } => Self::Rsa { key_id: id, key },
            Self::Symmetric { key, .. } => Self::Symmetric { key_id: id, key },
        }
    }

    /// Key ID, if known
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::Rsa { key_id, .. } | Self::Symmetric { key_id, .. } => key_id.as_deref(),
        }
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Rsa { .. } => "rsa",
            Self::Symmetric { .. } => "symmetric",
        };
        f.debug_struct("EncryptionKey")
            .field("kind", &kind)
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ec_jwk() -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
            "use": "sig",
            "kid": "ec-1"
        }))
        .unwrap()
    }

    #[test]
    fn test_ec_jwk_conversion() {
        let key = VerificationKey::from_jwk(&ec_jwk()).unwrap();
        assert_eq!(key.family(), JwsFamily::Ec);
        assert_eq!(key.key_id(), Some("ec-1"));
    }

    #[test]
    fn test_conversion_skips_broken_keys() {
        let broken: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "kid": "broken",
            "n": "!!not-base64!!",
            "e": "AQAB"
        }))
        .unwrap();
        let jwks = vec![ec_jwk(), broken];

        let conversion = KeyConversion::from_jwks(&jwks);
        assert_eq!(conversion.keys.len(), 1);
        assert_eq!(conversion.skipped.len(), 1);
        assert_eq!(conversion.skipped[0].key_id.as_deref(), Some("broken"));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = DecryptionKey::symmetric(vec![0xAB; 32]).with_key_id("k");
        let rendered = format!("{key:?}");
        assert!(rendered.contains("symmetric"));
        assert!(!rendered.contains("171"));
    }
}
