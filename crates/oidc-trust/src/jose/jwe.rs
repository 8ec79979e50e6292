//! JWE decryption and encryption (compact serialization)
//!
//! Supported key management: `dir` and `RSA-OAEP-256`. Supported content
//! encryption: `A128GCM`, `A256GCM`, `A128CBC-HS256` and `A256CBC-HS512`.
//! The additional authenticated data is always the ASCII protected header as
//! it appears on the wire.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use ring::hmac;
use rsa::Oaep;
use secrecy::ExposeSecret;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::algorithm::{EncryptionMethod, JweAlgorithm};
use super::object::{EncryptedObject, JoseHeader, encode_header};
use crate::cipher::{aes_cbc_decrypt, aes_cbc_encrypt};
use crate::error::ErrorKind;
use crate::keys::{DecryptionKey, EncryptionKey};

const GCM_TAG_LEN: usize = 16;

/// JWE processing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JweError {
    /// `alg` is not a supported key management algorithm
    #[error("unsupported JWE algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// `enc` is missing or not a supported content encryption method
    #[error("unsupported JWE encryption method: {0}")]
    UnsupportedEncryption(String),

    /// The `zip` header is present
    #[error("compressed JWE payloads are not supported")]
    UnsupportedCompression,

    /// The key type does not fit the key management algorithm
    #[error("key does not fit JWE algorithm {0}")]
    KeyMismatch(JweAlgorithm),

    /// A direct key has the wrong length for the content encryption method
    #[error("content encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// A `dir` JWE carries an encrypted key
    #[error("dir JWE must not carry an encrypted key")]
    UnexpectedEncryptedKey,

    /// The initialization vector length is wrong for the method
    #[error("invalid initialization vector length")]
    InvalidIv,

    /// Authentication tag mismatch, wrong key, or corrupted ciphertext
    #[error("JWE authentication failed")]
    Authentication,

    /// Encryption failed on the issuer side
    #[error("JWE encryption failed: {0}")]
    Encryption(String),
}

impl JweError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKeyLength { .. } | Self::KeyMismatch(_) | Self::Encryption(_) => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Cryptographic,
        }
    }
}

/// Algorithms a JWE header declares, resolved against the supported set
pub(crate) fn header_algorithms(
    header: &JoseHeader,
) -> Result<(JweAlgorithm, EncryptionMethod), JweError> {
    if header.zip.is_some() {
        return Err(JweError::UnsupportedCompression);
    }
    let alg = header
        .jwe_algorithm()
        .ok_or_else(|| JweError::UnsupportedAlgorithm(header.alg.clone()))?;
    let enc = header
        .encryption_method()
        .ok_or_else(|| JweError::UnsupportedEncryption(header.enc.clone().unwrap_or_default()))?;
    Ok((alg, enc))
}

/// Decrypt a JWE with one candidate key
///
/// # Errors
///
/// Returns [`JweError::Authentication`] for every failure that depends on
/// the key or ciphertext, and a more specific error for unsupported headers
/// or unusable keys.
pub fn decrypt(object: &EncryptedObject, key: &DecryptionKey) -> Result<Vec<u8>, JweError> {
    let (alg, enc) = header_algorithms(object.header())?;
    if object.iv.len() != enc.iv_len() {
        return Err(JweError::InvalidIv);
    }

    let cek = match (alg, key) {
        (JweAlgorithm::Dir, DecryptionKey::Symmetric { key, .. }) => {
            if !object.encrypted_key.is_empty() {
                return Err(JweError::UnexpectedEncryptedKey);
            }
            let key = key.expose_secret();
            if key.len() != enc.key_len() {
                return Err(JweError::InvalidKeyLength {
                    expected: enc.key_len(),
                    actual: key.len(),
                });
            }
            key.clone()
        }
        (JweAlgorithm::RsaOaep256, DecryptionKey::Rsa { key, .. }) => {
            // An unwrap failure continues with a random CEK so it surfaces as
            // an authentication failure, the same as a wrong key would
            match key.decrypt(Oaep::new::<Sha256>(), &object.encrypted_key) {
                Ok(cek) if cek.len() == enc.key_len() => cek,
                _ => random_bytes(enc.key_len()),
            }
        }
        (alg, _) => return Err(JweError::KeyMismatch(alg)),
    };

    decrypt_content(
        enc,
        &cek,
        &object.iv,
        &object.ciphertext,
        &object.tag,
        object.protected_header.as_bytes(),
    )
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn decrypt_content(
    enc: EncryptionMethod,
    cek: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, JweError> {
    match enc {
        EncryptionMethod::A128Gcm | EncryptionMethod::A256Gcm => {
            if tag.len() != GCM_TAG_LEN {
                return Err(JweError::Authentication);
            }
            let mut msg = Vec::with_capacity(ciphertext.len() + tag.len());
            msg.extend_from_slice(ciphertext);
            msg.extend_from_slice(tag);
            let payload = Payload { msg: &msg, aad };
            let nonce = Nonce::from_slice(iv);
            let plaintext = if enc == EncryptionMethod::A128Gcm {
                Aes128Gcm::new_from_slice(cek)
                    .map_err(|_| JweError::Authentication)?
                    .decrypt(nonce, payload)
            } else {
                Aes256Gcm::new_from_slice(cek)
                    .map_err(|_| JweError::Authentication)?
                    .decrypt(nonce, payload)
            };
            plaintext.map_err(|_| JweError::Authentication)
        }
        EncryptionMethod::A128CbcHs256 | EncryptionMethod::A256CbcHs512 => {
            let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
            let expected = cbc_hmac_tag(enc, mac_key, aad, iv, ciphertext);
            if !bool::from(expected.ct_eq(tag)) {
                return Err(JweError::Authentication);
            }
            aes_cbc_decrypt(enc_key, iv, ciphertext).map_err(|_| JweError::Authentication)
        }
    }
}

/// RFC 7518 5.2.2.1 authentication tag: the leading half of
/// HMAC(MAC_KEY, AAD || IV || C || AL)
fn cbc_hmac_tag(
    enc: EncryptionMethod,
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Vec<u8> {
    let algorithm = if enc == EncryptionMethod::A128CbcHs256 {
        hmac::HMAC_SHA256
    } else {
        hmac::HMAC_SHA512
    };
    let key = hmac::Key::new(algorithm, mac_key);
    let aad_bits = (aad.len() as u64) * 8;

    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(aad);
    ctx.update(iv);
    ctx.update(ciphertext);
    ctx.update(&aad_bits.to_be_bytes());
    let full = ctx.sign();
    full.as_ref()[..mac_key.len()].to_vec()
}

/// Produces compact JWEs for one recipient key
#[derive(Debug, Clone)]
pub struct JweEncrypter {
    alg: JweAlgorithm,
    enc: EncryptionMethod,
    key: EncryptionKey,
    content_type: Option<String>,
}

impl JweEncrypter {
    /// Encrypter for `alg` / `enc` to `key`
    ///
    /// # Errors
    ///
    /// Returns [`JweError::KeyMismatch`] when the key type does not fit `alg`
    /// and [`JweError::InvalidKeyLength`] when a direct key has the wrong size.
    pub fn new(
        alg: JweAlgorithm,
        enc: EncryptionMethod,
        key: EncryptionKey,
    ) -> Result<Self, JweError> {
        match (&key, alg) {
            (EncryptionKey::Symmetric { key, .. }, JweAlgorithm::Dir) => {
                let len = key.expose_secret().len();
                if len != enc.key_len() {
                    return Err(JweError::InvalidKeyLength {
                        expected: enc.key_len(),
                        actual: len,
                    });
                }
            }
            (EncryptionKey::Rsa { .. }, JweAlgorithm::RsaOaep256) => {}
            _ => return Err(JweError::KeyMismatch(alg)),
        }
        Ok(Self {
            alg,
            enc,
            key,
            content_type: None,
        })
    }

    /// Mark the payload as a nested JWT (`cty: JWT`)
    #[must_use]
    pub fn nested_jwt(mut self) -> Self {
        self.content_type = Some("JWT".to_string());
        self
    }

    /// Encrypt `plaintext` into a compact JWE
    ///
    /// # Errors
    ///
    /// Returns [`JweError::Encryption`] if RSA key wrapping or the cipher fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, JweError> {
        let mut header = JoseHeader::new(self.alg.as_str());
        header.enc = Some(self.enc.as_str().to_string());
        header.kid = self.key.key_id().map(str::to_string);
        header.cty = self.content_type.clone();
        let protected = encode_header(&header);

        let (cek, encrypted_key) = match &self.key {
            EncryptionKey::Symmetric { key, .. } => (key.expose_secret().clone(), Vec::new()),
            EncryptionKey::Rsa { key, .. } => {
                let cek = random_bytes(self.enc.key_len());
                let wrapped = key
                    .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &cek)
                    .map_err(|e| JweError::Encryption(e.to_string()))?;
                (cek, wrapped)
            }
        };

        let iv = random_bytes(self.enc.iv_len());
        let aad = protected.as_bytes();
        let (ciphertext, tag) = match self.enc {
            EncryptionMethod::A128Gcm | EncryptionMethod::A256Gcm => {
                let nonce = Nonce::from_slice(&iv);
                let payload = Payload {
                    msg: plaintext,
                    aad,
                };
                let mut sealed = if self.enc == EncryptionMethod::A128Gcm {
                    Aes128Gcm::new_from_slice(&cek)
                        .map_err(|e| JweError::Encryption(e.to_string()))?
                        .encrypt(nonce, payload)
                } else {
                    Aes256Gcm::new_from_slice(&cek)
                        .map_err(|e| JweError::Encryption(e.to_string()))?
                        .encrypt(nonce, payload)
                }
                .map_err(|e| JweError::Encryption(e.to_string()))?;
                let tag = sealed.split_off(sealed.len() - GCM_TAG_LEN);
                (sealed, tag)
            }
            EncryptionMethod::A128CbcHs256 | EncryptionMethod::A256CbcHs512 => {
                let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
                let ciphertext = aes_cbc_encrypt(enc_key, &iv, plaintext)
                    .map_err(|e| JweError::Encryption(e.to_string()))?;
                let tag = cbc_hmac_tag(self.enc, mac_key, aad, &iv, &ciphertext);
                (ciphertext, tag)
            }
        };

        Ok(format!(
            "{}.{}.{}.{}.{}",
            protected,
            URL_SAFE_NO_PAD.encode(encrypted_key),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jose::JoseObject;

    fn encrypted(compact: &str) -> EncryptedObject {
        match JoseObject::parse(compact).unwrap() {
            JoseObject::Encrypted(obj) => obj,
            other => panic!("expected JWE, got {}", other.variant()),
        }
    }

    #[test]
    fn test_dir_all_methods() {
        for enc in [
            EncryptionMethod::A128Gcm,
            EncryptionMethod::A256Gcm,
            EncryptionMethod::A128CbcHs256,
            EncryptionMethod::A256CbcHs512,
        ] {
            let raw = vec![0x5Au8; enc.key_len()];
            let encrypter =
                JweEncrypter::new(JweAlgorithm::Dir, enc, EncryptionKey::symmetric(raw.clone()))
                    .unwrap();
            let compact = encrypter.encrypt(b"{\"sub\":\"alice\"}").unwrap();
            let object = encrypted(&compact);
            assert_eq!(
                decrypt(&object, &DecryptionKey::symmetric(raw)).unwrap(),
                b"{\"sub\":\"alice\"}",
                "{enc}"
            );
        }
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let enc = EncryptionMethod::A128CbcHs256;
        let encrypter =
            JweEncrypter::new(JweAlgorithm::Dir, enc, EncryptionKey::symmetric(vec![1u8; 32]))
                .unwrap();
        let object = encrypted(&encrypter.encrypt(b"payload").unwrap());
        assert_eq!(
            decrypt(&object, &DecryptionKey::symmetric(vec![2u8; 32])),
            Err(JweError::Authentication)
        );
    }

    #[test]
    fn test_tampered_header_fails_authentication() {
        let encrypter = JweEncrypter::new(
            JweAlgorithm::Dir,
            EncryptionMethod::A256Gcm,
            EncryptionKey::symmetric(vec![3u8; 32]).with_key_id("k1"),
        )
        .unwrap();
        let compact = encrypter.encrypt(b"payload").unwrap();
        let mut parts: Vec<String> = compact.split('.').map(str::to_string).collect();
        let mut header: JoseHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[0]).unwrap()).unwrap();
        header.kid = Some("k2".into());
        parts[0] = encode_header(&header);

        let object = encrypted(&parts.join("."));
        assert_eq!(
            decrypt(&object, &DecryptionKey::symmetric(vec![3u8; 32])),
            Err(JweError::Authentication)
        );
    }

    #[test]
    fn test_key_type_must_fit_algorithm() {
        assert_eq!(
            JweEncrypter::new(
                JweAlgorithm::Dir,
                EncryptionMethod::A128Gcm,
                EncryptionKey::symmetric(vec![0u8; 32])
            )
            .unwrap_err(),
            JweError::InvalidKeyLength {
                expected: 16,
                actual: 32
            }
        );
    }

    #[test]
    fn test_compression_rejected() {
        let mut header = JoseHeader::new("dir");
        header.enc = Some("A128GCM".into());
        header.zip = Some("DEF".into());
        assert_eq!(
            header_algorithms(&header),
            Err(JweError::UnsupportedCompression)
        );
    }
}
