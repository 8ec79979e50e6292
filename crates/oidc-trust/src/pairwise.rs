//! Pairwise subject identifiers (OpenID Connect Core 8.1)
//!
//! A pairwise codec maps a local subject and a [`SectorId`] to an opaque
//! subject that differs per sector, so relying parties cannot correlate an
//! end-user across sectors. Output is deterministic for fixed inputs.
//!
//! - [`HashedPairwiseCodec`]: one-way, `Base64URL(SHA-256(sector || subject || salt))`
//! - [`EncryptedPairwiseCodec`]: reversible, AES-CBC over `sector|subject`
//!   with the salt as IV
//!
//! ```rust
//! use oidc_trust::identifier::{SectorId, Subject};
//! use oidc_trust::pairwise::{HashedPairwiseCodec, PairwiseSubjectCodec};
//!
//! let codec = HashedPairwiseCodec::new((0u8..16).collect::<Vec<_>>()).unwrap();
//! let sector = SectorId::new("example.com").unwrap();
//! let alice = Subject::new("alice").unwrap();
//!
//! let pairwise = codec.encode(&sector, &alice).unwrap();
//! assert_eq!(pairwise.as_str(), "Zk614Axw_IO1BlXc1VXalu2kK0SR9RPbFiFwM_O8VEE");
//! ```

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretVec};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cipher::{AES_BLOCK_LEN, aes_cbc_decrypt, aes_cbc_encrypt};
use crate::error::{ConfigError, ErrorKind};
use crate::identifier::{SectorId, Subject};

/// Minimum (and, for the encrypted codec, exact) salt length in bytes
pub const SALT_LENGTH: usize = 16;

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// Random salt of [`SALT_LENGTH`] bytes
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Pairwise subject encoding or decoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairwiseError {
    /// The codec is one-way
    #[error("Pairwise subject decoding is not supported")]
    DecodingNotSupported,

    /// The pairwise subject is not Base64URL
    #[error("Invalid pairwise subject encoding")]
    Encoding,

    /// The decrypted value is not `sector|subject`
    #[error("Invalid format")]
    InvalidFormat,

    /// AES-CBC failure, typically bad padding or length
    #[error("Pairwise subject decryption failed: {0}")]
    Crypto(String),
}

impl PairwiseError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DecodingNotSupported => ErrorKind::Configuration,
            Self::Encoding | Self::InvalidFormat => ErrorKind::Structural,
            Self::Crypto(_) => ErrorKind::Cryptographic,
        }
    }
}

/// Maps (sector, local subject) to a pairwise subject
pub trait PairwiseSubjectCodec: Send + Sync + std::fmt::Debug {
    /// Salt mixed into every encoding
    fn salt(&self) -> &[u8];

    /// Pairwise subject for `local_subject` at `sector`
    ///
    /// # Errors
    ///
    /// Returns [`PairwiseError`] if the subject cannot be encoded.
    fn encode(&self, sector: &SectorId, local_subject: &Subject)
    -> Result<Subject, PairwiseError>;

    /// Recover the sector and local subject
    ///
    /// # Errors
    ///
    /// Returns [`PairwiseError::DecodingNotSupported`] for one-way codecs.
    fn decode(&self, pairwise: &Subject) -> Result<(SectorId, Subject), PairwiseError>;
}

fn salt_debug(f: &mut std::fmt::Formatter<'_>, name: &str, salt: &[u8]) -> std::fmt::Result {
    f.debug_struct(name)
        .field("salt_len", &salt.len())
        .finish_non_exhaustive()
}

/// One-way SHA-256 pairwise codec
#[derive(Clone)]
pub struct HashedPairwiseCodec {
    salt: Vec<u8>,
}

impl HashedPairwiseCodec {
    /// Codec with `salt`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for salts under
    /// [`SALT_LENGTH`] bytes.
    pub fn new(salt: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let salt = salt.into();
        if salt.len() < SALT_LENGTH {
            return Err(ConfigError::invalid(
                "salt",
                format!("must be at least {SALT_LENGTH} bytes, got {}", salt.len()),
            ));
        }
        Ok(Self { salt })
    }
}

impl std::fmt::Debug for HashedPairwiseCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        salt_debug(f, "HashedPairwiseCodec", &self.salt)
    }
}

impl PairwiseSubjectCodec for HashedPairwiseCodec {
    fn salt(&self) -> &[u8] {
        &self.salt
    }

    fn encode(
        &self,
        sector: &SectorId,
        local_subject: &Subject,
    ) -> Result<Subject, PairwiseError> {
        let digest = Sha256::new()
            .chain_update(sector.as_str().as_bytes())
            .chain_update(local_subject.as_str().as_bytes())
            .chain_update(&self.salt)
            .finalize();
        Subject::new(URL_SAFE_NO_PAD.encode(digest)).map_err(|_| PairwiseError::Encoding)
    }

    fn decode(&self, _pairwise: &Subject) -> Result<(SectorId, Subject), PairwiseError> {
        Err(PairwiseError::DecodingNotSupported)
    }
}

/// Reversible AES-CBC pairwise codec
#[derive(Clone)]
pub struct EncryptedPairwiseCodec {
    salt: Vec<u8>,
    key: Arc<SecretVec<u8>>,
}

impl EncryptedPairwiseCodec {
    /// Codec with a 16-byte `salt` (the IV) and an AES `key` of 16, 24 or 32
    /// bytes
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for other salt or key lengths.
    pub fn new(salt: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let salt = salt.into();
        let key = key.into();
        if salt.len() != AES_BLOCK_LEN {
            return Err(ConfigError::invalid(
                "salt",
                format!("must be {AES_BLOCK_LEN} bytes, got {}", salt.len()),
            ));
        }
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(ConfigError::invalid(
                "key",
                format!("AES key must be 16, 24 or 32 bytes, got {}", key.len()),
            ));
        }
        Ok(Self {
            salt,
            key: Arc::new(SecretVec::new(key)),
        })
    }
}

impl std::fmt::Debug for EncryptedPairwiseCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        salt_debug(f, "EncryptedPairwiseCodec", &self.salt)
    }
}

impl PairwiseSubjectCodec for EncryptedPairwiseCodec {
    fn salt(&self) -> &[u8] {
        &self.salt
    }

    fn encode(
        &self,
        sector: &SectorId,
        local_subject: &Subject,
    ) -> Result<Subject, PairwiseError> {
        let plaintext = format!(
            "{}{SEPARATOR}{}",
            escape(sector.as_str()),
            escape(local_subject.as_str())
        );
        let ciphertext = aes_cbc_encrypt(self.key.expose_secret(), &self.salt, plaintext.as_bytes())
            .map_err(|e| PairwiseError::Crypto(e.to_string()))?;
        Subject::new(URL_SAFE_NO_PAD.encode(ciphertext)).map_err(|_| PairwiseError::Encoding)
    }

    fn decode(&self, pairwise: &Subject) -> Result<(SectorId, Subject), PairwiseError> {
        let ciphertext = URL_SAFE_NO_PAD
            .decode(pairwise.as_str())
            .map_err(|_| PairwiseError::Encoding)?;
        let plaintext = aes_cbc_decrypt(self.key.expose_secret(), &self.salt, &ciphertext)
            .map_err(|e| PairwiseError::Crypto(e.to_string()))?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| PairwiseError::InvalidFormat)?;

        let [sector, subject]: [String; 2] = split_unescaped(&plaintext)
            .try_into()
            .map_err(|_| PairwiseError::InvalidFormat)?;
        let sector = SectorId::new(sector).map_err(|_| PairwiseError::InvalidFormat)?;
        let subject = Subject::new(subject).map_err(|_| PairwiseError::InvalidFormat)?;
        Ok((sector, subject))
    }
}

/// Escape `\` as `\\` and `|` as `\|`
fn escape(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        if c == ESCAPE || c == SEPARATOR {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Split on unescaped `|`, unescaping `\|` and `\\` in each field
fn split_unescaped(value: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE if matches!(chars.peek(), Some(&(SEPARATOR | ESCAPE))) => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            SEPARATOR => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}
