//! Client secrets with erasure, expiry and constant-time comparison
//!
//! A [`Secret`] is exclusively owned by its client-credential record. The value
//! is held in a [`secrecy::SecretVec`] so it is zeroized when dropped or
//! erased, and `Debug` never prints it.
//!
//! ## Comparison
//!
//! Equality hashes both values with SHA-256 and compares the digests with
//! `subtle::ConstantTimeEq`, so comparison time depends on neither the
//! position of the first mismatch nor the secret length.

use std::time::SystemTime;

use secrecy::{ExposeSecret, SecretVec};
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::identifier::{DEFAULT_BYTE_LENGTH, random_base64url};
use crate::jose::EncryptionMethod;

/// Shared client secret
pub struct Secret {
    value: SecretVec<u8>,
    expires_at: Option<SystemTime>,
}

impl Secret {
    /// Secret from a string value, without expiration
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretVec::new(value.into().into_bytes()),
            expires_at: None,
        }
    }

    /// Secret from a string value that expires at `expires_at`
    pub fn with_expiration(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Self::new(value)
        }
    }

    /// Random secret: [`DEFAULT_BYTE_LENGTH`] bytes, Base64URL-encoded
    pub fn random() -> Self {
        Self::new(random_base64url(DEFAULT_BYTE_LENGTH))
    }

    /// Random secret of `byte_len` bytes, Base64URL-encoded
    pub fn random_with_byte_len(byte_len: usize) -> Self {
        Self::new(random_base64url(byte_len))
    }

    /// Raw secret bytes
    pub fn expose_bytes(&self) -> &[u8] {
        self.value.expose_secret()
    }

    /// Secret value as a string, `None` if not valid UTF-8
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(self.expose_bytes()).ok()
    }

    /// Length of the secret in bits
    pub fn bit_len(&self) -> usize {
        self.expose_bytes().len() * 8
    }

    /// Expiration time, if any
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Whether the secret has expired at `now`
    ///
    /// A secret without expiration never expires; one with an expiration is
    /// expired once `now` is strictly after it.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Whether the secret has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Overwrite the secret in place
    ///
    /// The previous value is zeroized; the secret is empty afterwards.
    pub fn erase(&mut self) {
        self.value = SecretVec::new(Vec::new());
    }

    /// Whether the secret has been erased (or was empty)
    pub fn is_erased(&self) -> bool {
        self.expose_bytes().is_empty()
    }

    /// Symmetric key for `dir` JWE derived from this secret
    ///
    /// Per OpenID Connect Core 10.2, the key is the leftmost bits of the
    /// SHA-256, SHA-384 or SHA-512 hash of the secret octets, whichever is the
    /// smallest hash large enough for the content encryption key.
    pub fn derive_encryption_key(&self, enc: EncryptionMethod) -> SecretVec<u8> {
        let key_len = enc.key_len();
        let digest: Vec<u8> = if key_len <= 32 {
            Sha256::digest(self.expose_bytes()).to_vec()
        } else if key_len <= 48 {
            Sha384::digest(self.expose_bytes()).to_vec()
        } else {
            Sha512::digest(self.expose_bytes()).to_vec()
        };
        SecretVec::new(digest[..key_len].to_vec())
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self {
            value: SecretVec::new(self.expose_bytes().to_vec()),
            expires_at: self.expires_at,
        }
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        let a = Sha256::digest(self.expose_bytes());
        let b = Sha256::digest(other.expose_bytes());
        a.ct_eq(&b).into()
    }
}

impl Eq for Secret {}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
