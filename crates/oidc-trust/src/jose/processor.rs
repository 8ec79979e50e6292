//! JOSE decode dispatcher
//!
//! [`JoseProcessor`] turns a parsed [`JoseObject`] into a trusted payload. Its
//! configuration is fixed at construction:
//!
//! | Constructor              | Plain | Signed | Encrypted | Signed then encrypted |
//! |--------------------------|-------|--------|-----------|-----------------------|
//! | `unsecured()`            | yes   | no     | no        | no                    |
//! | `signed(jws)`            | no    | yes    | no        | no                    |
//! | `encrypted(jwe)`         | no    | no     | yes       | no                    |
//! | `signed_and_encrypted()` | no    | no     | no        | yes                   |
//!
//! The algorithm a key is used with always passes through a key selector,
//! which refuses algorithms outside its configuration, so a header claiming
//! `none` or switching HMAC for RSA never reaches a verifier.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::jwe::{self, JweError, header_algorithms};
use super::object::{EncryptedObject, JoseObject, ParseError, SignedObject};
use crate::error::ErrorKind;
use crate::keys::{JweKeySelector, JwsKeySelector};

/// How the accepted payload was secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecuredVariant {
    /// Unsecured
    Plain,
    /// Signature verified
    Signed,
    /// Decrypted
    Encrypted,
    /// Decrypted, then the nested signature verified
    SignedThenEncrypted,
}

/// A payload the processor has accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Cleartext payload bytes
    pub payload: Vec<u8>,
    /// How it was secured
    pub variant: SecuredVariant,
}

/// Dispatcher failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoseError {
    /// Not a valid compact serialization
    #[error(transparent)]
    Malformed(#[from] ParseError),

    /// An unsecured object where a secured one is required
    #[error("Unsecured JOSE object rejected: Signed object expected")]
    PlainRejected,

    /// A JWS arrived but no JWS key selector is configured
    #[error("Signed JOSE object rejected: verification not configured")]
    SignedNotConfigured,

    /// A JWE arrived but no JWE key selector is configured
    #[error("Encrypted JOSE object rejected: decryption not configured")]
    EncryptedNotConfigured,

    /// A bare JWS arrived where a signed-then-encrypted object is required
    #[error("Signed JOSE object rejected: Encrypted object expected")]
    EncryptionRequired,

    /// The header algorithm is not one this crate implements
    #[error("JOSE object rejected: unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// The key selector returned no candidates
    #[error("JOSE object rejected: Another algorithm expected, or no matching key(s) found")]
    NoCandidateKeys,

    /// No candidate key verified the signature
    #[error("Signed JOSE object rejected: Invalid signature")]
    BadSignature,

    /// No candidate key decrypted the object
    #[error("Encrypted JOSE object rejected: {0}")]
    Decryption(JweError),

    /// The decrypted payload must be a signed JWT but is not
    #[error("Encrypted JOSE object rejected: nested signed JWT expected")]
    NestedSignatureRequired,

    /// The decrypted payload is itself encrypted, or not text
    #[error("Encrypted JOSE object rejected: unsupported nested content")]
    UnsupportedNesting,
}

impl JoseError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) | Self::UnsupportedNesting => ErrorKind::Structural,
            Self::SignedNotConfigured | Self::EncryptedNotConfigured => ErrorKind::Configuration,
            _ => ErrorKind::Cryptographic,
        }
    }
}

/// Verifies and decrypts JOSE objects with a fixed set of key selectors
#[derive(Debug, Clone)]
pub struct JoseProcessor {
    jws: Option<Arc<dyn JwsKeySelector>>,
    jwe: Option<Arc<dyn JweKeySelector>>,
}

impl JoseProcessor {
    /// Accept unsecured objects only
    pub fn unsecured() -> Self {
        Self {
            jws: None,
            jwe: None,
        }
    }

    /// Accept JWS objects verified by `jws`
    pub fn signed(jws: Arc<dyn JwsKeySelector>) -> Self {
        Self {
            jws: Some(jws),
            jwe: None,
        }
    }

    /// Accept JWE objects decrypted by `jwe`, with no nested signature
    pub fn encrypted(jwe: Arc<dyn JweKeySelector>) -> Self {
        Self {
            jws: None,
            jwe: Some(jwe),
        }
    }

    /// Accept only JWE objects wrapping a JWS; both layers must verify
    pub fn signed_and_encrypted(jws: Arc<dyn JwsKeySelector>, jwe: Arc<dyn JweKeySelector>) -> Self {
        Self {
            jws: Some(jws),
            jwe: Some(jwe),
        }
    }

    /// Whether a JWS key selector is configured
    pub fn verifies_signatures(&self) -> bool {
        self.jws.is_some()
    }

    /// Whether a JWE key selector is configured
    pub fn decrypts(&self) -> bool {
        self.jwe.is_some()
    }

    /// Parse and process a compact serialization
    ///
    /// # Errors
    ///
    /// See [`JoseProcessor::process`].
    pub async fn process_compact(&self, compact: &str) -> Result<Verified, JoseError> {
        let object = JoseObject::parse(compact)?;
        self.process(&object).await
    }

    /// Verify or decrypt `object` and return its payload
    ///
    /// # Errors
    ///
    /// Returns a [`JoseError`] when the object's variant is not accepted by
    /// this configuration, or when verification or decryption fails.
    pub async fn process(&self, object: &JoseObject) -> Result<Verified, JoseError> {
        let result = match object {
            JoseObject::Plain(plain) => {
                if self.jws.is_some() || self.jwe.is_some() {
                    Err(JoseError::PlainRejected)
                } else {
                    Ok(Verified {
                        payload: plain.payload().to_vec(),
                        variant: SecuredVariant::Plain,
                    })
                }
            }
            JoseObject::Signed(signed) => {
                if self.jwe.is_some() {
                    Err(JoseError::EncryptionRequired)
                } else {
                    self.verify_signed(signed).await.map(|payload| Verified {
                        payload,
                        variant: SecuredVariant::Signed,
                    })
                }
            }
            JoseObject::Encrypted(encrypted) => self.process_encrypted(encrypted).await,
        };

        if let Err(e) = &result {
            debug!(variant = object.variant(), error = %e, "JOSE object rejected");
        }
        result
    }

    async fn verify_signed(&self, signed: &SignedObject) -> Result<Vec<u8>, JoseError> {
        let Some(selector) = &self.jws else {
            return Err(JoseError::SignedNotConfigured);
        };
        let header = signed.header();
        let alg = header
            .jws_algorithm()
            .ok_or_else(|| JoseError::UnsupportedAlgorithm(header.alg.clone()))?;

        let candidates = selector.select_jws_keys(alg, header).await;
        if candidates.is_empty() {
            return Err(JoseError::NoCandidateKeys);
        }
        if candidates
            .iter()
            .any(|key| signed.verify_signature(alg, key))
        {
            Ok(signed.unverified_payload().to_vec())
        } else {
            Err(JoseError::BadSignature)
        }
    }

    async fn decrypt(&self, encrypted: &EncryptedObject) -> Result<Vec<u8>, JoseError> {
        let Some(selector) = &self.jwe else {
            return Err(JoseError::EncryptedNotConfigured);
        };
        let header = encrypted.header();
        let (alg, enc) = header_algorithms(header).map_err(|e| match e {
            JweError::UnsupportedAlgorithm(alg) | JweError::UnsupportedEncryption(alg) => {
                JoseError::UnsupportedAlgorithm(alg)
            }
            other => JoseError::Decryption(other),
        })?;

        let candidates = selector.select_jwe_keys(alg, enc, header).await;
        let mut last_error = None;
        for key in &candidates {
            match jwe::decrypt(encrypted, key) {
                Ok(payload) => return Ok(payload),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.map_or(JoseError::NoCandidateKeys, JoseError::Decryption))
    }

    async fn process_encrypted(&self, encrypted: &EncryptedObject) -> Result<Verified, JoseError> {
        let payload = self.decrypt(encrypted).await?;

        let nested = encrypted.header().is_nested_jwt();
        if !nested && self.jws.is_none() {
            return Ok(Verified {
                payload,
                variant: SecuredVariant::Encrypted,
            });
        }
        if self.jws.is_none() {
            // cty JWT but nothing to verify the inner signature with
            return Err(JoseError::SignedNotConfigured);
        }

        let inner = std::str::from_utf8(&payload).map_err(|_| JoseError::NestedSignatureRequired)?;
        match JoseObject::parse(inner) {
            Ok(JoseObject::Signed(signed)) => {
                self.verify_signed(&signed).await.map(|payload| Verified {
                    payload,
                    variant: SecuredVariant::SignedThenEncrypted,
                })
            }
            Ok(JoseObject::Encrypted(_)) => Err(JoseError::UnsupportedNesting),
            Ok(JoseObject::Plain(_)) | Err(_) => Err(JoseError::NestedSignatureRequired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimsSet;
    use crate::jose::{EncryptionMethod, JweAlgorithm, JweEncrypter, PlainObject};
    use crate::keys::{
        DecryptionKey, EncryptionKey, HmacKeySelector, JweDecryptionKeySelector,
    };
    use crate::secret::Secret;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn hmac_selector() -> Arc<dyn JwsKeySelector> {
        Arc::new(HmacKeySelector::new(Algorithm::HS256, Secret::new(SECRET)).unwrap())
    }

    fn jwe_selector() -> Arc<dyn JweKeySelector> {
        Arc::new(
            JweDecryptionKeySelector::new(
                JweAlgorithm::Dir,
                EncryptionMethod::A128CbcHs256,
                [DecryptionKey::symmetric(vec![9u8; 32])],
            )
            .unwrap(),
        )
    }

    fn encrypter() -> JweEncrypter {
        JweEncrypter::new(
            JweAlgorithm::Dir,
            EncryptionMethod::A128CbcHs256,
            EncryptionKey::symmetric(vec![9u8; 32]),
        )
        .unwrap()
    }

    fn hs_token(alg: Algorithm, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(alg),
            &serde_json::json!({"sub": "alice"}),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn plain_token() -> String {
        PlainObject::serialize_claims(&ClaimsSet::builder().subject("alice").build())
    }

    #[tokio::test]
    async fn test_unsecured_mode() {
        let processor = JoseProcessor::unsecured();
        let verified = processor.process_compact(&plain_token()).await.unwrap();
        assert_eq!(verified.variant, SecuredVariant::Plain);

        let err = processor
            .process_compact(&hs_token(Algorithm::HS256, SECRET))
            .await
            .unwrap_err();
        assert_eq!(err, JoseError::SignedNotConfigured);
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_signed_mode() {
        let processor = JoseProcessor::signed(hmac_selector());
        let verified = processor
            .process_compact(&hs_token(Algorithm::HS256, SECRET))
            .await
            .unwrap();
        assert_eq!(verified.variant, SecuredVariant::Signed);
        assert_eq!(
            ClaimsSet::from_slice(&verified.payload).unwrap().subject().unwrap(),
            Some("alice")
        );

        assert_eq!(
            processor.process_compact(&plain_token()).await,
            Err(JoseError::PlainRejected)
        );
        assert_eq!(
            processor
                .process_compact(&hs_token(Algorithm::HS256, "ffffffffffffffffffffffffffffffff"))
                .await,
            Err(JoseError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_algorithm_substitution_yields_no_candidates() {
        let processor = JoseProcessor::signed(hmac_selector());
        let err = processor
            .process_compact(&hs_token(Algorithm::HS512, SECRET))
            .await
            .unwrap_err();
        assert_eq!(err, JoseError::NoCandidateKeys);
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
    }

    #[tokio::test]
    async fn test_signed_and_encrypted_mode() {
        let processor = JoseProcessor::signed_and_encrypted(hmac_selector(), jwe_selector());
        let inner = hs_token(Algorithm::HS256, SECRET);
        let outer = encrypter().nested_jwt().encrypt(inner.as_bytes()).unwrap();

        let verified = processor.process_compact(&outer).await.unwrap();
        assert_eq!(verified.variant, SecuredVariant::SignedThenEncrypted);

        assert_eq!(
            processor.process_compact(&inner).await,
            Err(JoseError::EncryptionRequired)
        );

        let unsigned = encrypter().encrypt(plain_token().as_bytes()).unwrap();
        assert_eq!(
            processor.process_compact(&unsigned).await,
            Err(JoseError::NestedSignatureRequired)
        );
    }

    #[tokio::test]
    async fn test_encrypted_mode() {
        let processor = JoseProcessor::encrypted(jwe_selector());
        let outer = encrypter().encrypt(br#"{"sub":"alice"}"#).unwrap();
        let verified = processor.process_compact(&outer).await.unwrap();
        assert_eq!(verified.variant, SecuredVariant::Encrypted);
        assert_eq!(verified.payload, br#"{"sub":"alice"}"#);

        let wrong = JweEncrypter::new(
            JweAlgorithm::Dir,
            EncryptionMethod::A128CbcHs256,
            EncryptionKey::symmetric(vec![8u8; 32]),
        )
        .unwrap()
        .encrypt(b"x")
        .unwrap();
        assert_eq!(
            processor.process_compact(&wrong).await,
            Err(JoseError::Decryption(JweError::Authentication))
        );
    }

    #[tokio::test]
    async fn test_encrypted_mode_nested_jwt_not_configured() {
        let processor = JoseProcessor::encrypted(jwe_selector());
        let inner = hs_token(Algorithm::HS256, SECRET);
        let outer = encrypter().nested_jwt().encrypt(inner.as_bytes()).unwrap();

        let err = processor.process_compact(&outer).await.unwrap_err();
        assert_eq!(err, JoseError::SignedNotConfigured);
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let err = JoseProcessor::unsecured()
            .process_compact("not-a-jwt")
            .await
            .unwrap_err();
        assert_eq!(err, JoseError::Malformed(ParseError::PartCount(1)));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }
}
