//! Key selectors
//!
//! A selector binds a claimed algorithm to the keys allowed to verify or
//! decrypt with it. A claimed algorithm outside the selector's configuration
//! yields no candidates; the dispatcher turns that into a verification
//! failure.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use tracing::{debug, warn};

use super::material::{DecryptionKey, KeyConversion, VerificationKey};
use super::matcher::JwkMatcher;
use super::source::JwkSetSource;
use super::{JweKeySelector, JwsKeySelector};
use crate::error::ConfigError;
use crate::jose::{EncryptionMethod, JoseHeader, JweAlgorithm, JwsFamily, jws_algorithm_name};
use crate::secret::Secret;

/// Minimum length of an HMAC shared secret
pub const MIN_HMAC_SECRET_BITS: usize = 256;

/// Selects RSA or EC public keys for a key owner from a JWK set source
#[derive(Debug, Clone)]
pub struct JwsVerificationKeySelector {
    owner: String,
    algorithms: Vec<Algorithm>,
    source: Arc<dyn JwkSetSource>,
}

impl JwsVerificationKeySelector {
    /// Selector for a single expected algorithm
    ///
    /// `owner` identifies whose keys the source holds (an issuer or client
    /// ID) and is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlgorithmNotPermitted`] unless `algorithm` is an
    /// RSA or EC signature algorithm.
    pub fn new(
        owner: impl Into<String>,
        algorithm: Algorithm,
        source: Arc<dyn JwkSetSource>,
    ) -> Result<Self, ConfigError> {
        Self::with_algorithms(owner, [algorithm], source)
    }

    /// Selector accepting any of several algorithms
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the list is empty or contains an algorithm
    /// outside the RSA and EC families.
    pub fn with_algorithms(
        owner: impl Into<String>,
        algorithms: impl IntoIterator<Item = Algorithm>,
        source: Arc<dyn JwkSetSource>,
    ) -> Result<Self, ConfigError> {
        let algorithms: Vec<Algorithm> = algorithms.into_iter().collect();
        if algorithms.is_empty() {
            return Err(ConfigError::invalid("algorithms", "at least one is required"));
        }
        if let Some(alg) = algorithms
            .iter()
            .find(|alg| !JwsFamily::of(**alg).is_rsa_or_ec())
        {
            return Err(ConfigError::AlgorithmNotPermitted {
                algorithm: jws_algorithm_name(*alg),
                reason: "public key selector requires an RSA or EC algorithm",
            });
        }
        Ok(Self {
            owner: owner.into(),
            algorithms,
            source,
        })
    }

    /// Key owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Permitted algorithms
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }
}

#[async_trait]
impl JwsKeySelector for JwsVerificationKeySelector {
    async fn select_jws_keys(&self, alg: Algorithm, header: &JoseHeader) -> Vec<VerificationKey> {
        if !self.algorithms.contains(&alg) {
            debug!(owner = %self.owner, alg = ?alg, "Algorithm not permitted for owner");
            return Vec::new();
        }

        let matcher = JwkMatcher::for_jws(alg, header);
        let jwks = match self.source.get(&matcher).await {
            Ok(jwks) => jwks,
            Err(e) => {
                warn!(owner = %self.owner, error = %e, "JWK set unavailable");
                return Vec::new();
            }
        };

        let conversion = KeyConversion::from_jwks(&jwks);
        for skipped in &conversion.skipped {
            debug!(owner = %self.owner, key_id = ?skipped.key_id, reason = %skipped.reason, "Skipping unusable JWK");
        }
        conversion.keys
    }
}

/// Selects the shared secret for one HMAC algorithm
#[derive(Debug, Clone)]
pub struct HmacKeySelector {
    algorithm: Algorithm,
    secret: Secret,
}

impl HmacKeySelector {
    /// Selector for `algorithm` keyed by `secret`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecretTooShort`] for secrets under 256 bits and
    /// [`ConfigError::AlgorithmNotPermitted`] for non-HMAC algorithms.
    pub fn new(algorithm: Algorithm, secret: Secret) -> Result<Self, ConfigError> {
        if JwsFamily::of(algorithm) != JwsFamily::Hmac {
            return Err(ConfigError::AlgorithmNotPermitted {
                algorithm: jws_algorithm_name(algorithm),
                reason: "HMAC key selector requires an HMAC algorithm",
            });
        }
        if secret.bit_len() < MIN_HMAC_SECRET_BITS {
            return Err(ConfigError::SecretTooShort {
                min_bits: MIN_HMAC_SECRET_BITS,
                actual_bits: secret.bit_len(),
            });
        }
        Ok(Self { algorithm, secret })
    }

    /// Expected algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

#[async_trait]
impl JwsKeySelector for HmacKeySelector {
    async fn select_jws_keys(&self, alg: Algorithm, _header: &JoseHeader) -> Vec<VerificationKey> {
        if alg != self.algorithm {
            debug!(expected = ?self.algorithm, claimed = ?alg, "HMAC algorithm mismatch");
            return Vec::new();
        }
        vec![VerificationKey::from_secret(&self.secret)]
    }
}

#[derive(Debug, Clone)]
enum JweKeys {
    Local(Vec<DecryptionKey>),
    ClientSecret(Secret),
}

/// Selects local decryption keys for one JWE algorithm and encryption method
#[derive(Debug, Clone)]
pub struct JweDecryptionKeySelector {
    algorithm: JweAlgorithm,
    method: EncryptionMethod,
    keys: JweKeys,
}

impl JweDecryptionKeySelector {
    /// Selector over local keys
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if no key fits `algorithm`, or a `dir` key has
    /// the wrong length for `method`.
    pub fn new(
        algorithm: JweAlgorithm,
        method: EncryptionMethod,
        keys: impl IntoIterator<Item = DecryptionKey>,
    ) -> Result<Self, ConfigError> {
        let keys: Vec<DecryptionKey> = keys.into_iter().collect();
        for key in &keys {
            match (algorithm, key) {
                (JweAlgorithm::Dir, DecryptionKey::Symmetric { .. }) => {
                    let len = key.symmetric_bytes().map_or(0, <[u8]>::len);
                    if len != method.key_len() {
                        return Err(ConfigError::invalid(
                            "key",
                            format!("{method} requires a {} byte key, got {len}", method.key_len()),
                        ));
                    }
                }
                (JweAlgorithm::RsaOaep256, DecryptionKey::Rsa { .. }) => {}
                _ => {
                    return Err(ConfigError::AlgorithmNotPermitted {
                        algorithm: algorithm.to_string(),
                        reason: "key type does not fit the JWE algorithm",
                    });
                }
            }
        }
        if keys.is_empty() {
            return Err(ConfigError::invalid("keys", "at least one is required"));
        }
        Ok(Self {
            algorithm,
            method,
            keys: JweKeys::Local(keys),
        })
    }

    /// `dir` selector whose key is derived from a client secret
    pub fn from_client_secret(method: EncryptionMethod, secret: Secret) -> Self {
        Self {
            algorithm: JweAlgorithm::Dir,
            method,
            keys: JweKeys::ClientSecret(secret),
        }
    }

    /// Expected key management algorithm
    pub fn algorithm(&self) -> JweAlgorithm {
        self.algorithm
    }

    /// Expected content encryption method
    pub fn method(&self) -> EncryptionMethod {
        self.method
    }
}

#[async_trait]
impl JweKeySelector for JweDecryptionKeySelector {
    async fn select_jwe_keys(
        &self,
        alg: JweAlgorithm,
        enc: EncryptionMethod,
        header: &JoseHeader,
    ) -> Vec<DecryptionKey> {
        if alg != self.algorithm || enc != self.method {
            debug!(
                expected_alg = %self.algorithm,
                expected_enc = %self.method,
                claimed_alg = %alg,
                claimed_enc = %enc,
                "JWE algorithm mismatch"
            );
            return Vec::new();
        }
        match &self.keys {
            JweKeys::ClientSecret(secret) => vec![DecryptionKey::from_client_secret(secret, enc)],
            JweKeys::Local(keys) => keys
                .iter()
                .filter(|key| match (header.kid.as_deref(), key.key_id()) {
                    (Some(claimed), Some(own)) => claimed == own,
                    _ => true,
                })
                .cloned()
                .collect(),
        }
    }
}
