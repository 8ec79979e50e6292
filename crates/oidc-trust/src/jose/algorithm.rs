//! JOSE algorithm identifiers and families
//!
//! JWS algorithms reuse [`jsonwebtoken::Algorithm`]; this module adds the
//! family classification used by key selectors and the JWE `alg` / `enc`
//! identifiers supported by [`super::jwe`].

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

/// Key family a JWS algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwsFamily {
    /// HS256, HS384, HS512
    Hmac,
    /// RS256..RS512 and PS256..PS512
    Rsa,
    /// ES256, ES384
    Ec,
    /// EdDSA
    Okp,
}

impl JwsFamily {
    /// Family of a JWS algorithm
    pub fn of(alg: Algorithm) -> Self {
        use Algorithm::*;
        if matches!(alg, HS256 | HS384 | HS512) {
            Self::Hmac
        } else if matches!(alg, RS256 | RS384 | RS512 | PS256 | PS384 | PS512) {
            Self::Rsa
        } else if matches!(alg, ES256 | ES384) {
            Self::Ec
        } else {
            Self::Okp
        }
    }

    /// Whether the family uses an asymmetric RSA or EC key pair
    pub fn is_rsa_or_ec(self) -> bool {
        matches!(self, Self::Rsa | Self::Ec)
    }
}

/// Registered name of a JWS algorithm, e.g. `RS256`
pub fn jws_algorithm_name(alg: Algorithm) -> String {
    serde_json::to_value(alg)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{alg:?}"))
}

/// JWE key management algorithm (`alg`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JweAlgorithm {
    /// Direct use of a shared symmetric key
    Dir,
    /// RSAES-OAEP with SHA-256 and MGF1 with SHA-256
    RsaOaep256,
}

impl JweAlgorithm {
    /// Registered name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::RsaOaep256 => "RSA-OAEP-256",
        }
    }
}

impl fmt::Display for JweAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JweAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dir" => Ok(Self::Dir),
            "RSA-OAEP-256" => Ok(Self::RsaOaep256),
            other => Err(other.to_string()),
        }
    }
}

/// JWE content encryption method (`enc`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionMethod {
    /// AES-128 in Galois/Counter Mode
    A128Gcm,
    /// AES-256 in Galois/Counter Mode
    A256Gcm,
    /// AES-128-CBC with HMAC-SHA-256 (RFC 7518 5.2.3)
    A128CbcHs256,
    /// AES-256-CBC with HMAC-SHA-512 (RFC 7518 5.2.5)
    A256CbcHs512,
}

impl EncryptionMethod {
    /// Registered name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// Content encryption key length in bytes
    pub fn key_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A256Gcm => 32,
            Self::A128CbcHs256 => 32,
            Self::A256CbcHs512 => 64,
        }
    }

    /// Initialization vector length in bytes
    pub fn iv_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A256Gcm => 12,
            Self::A128CbcHs256 | Self::A256CbcHs512 => 16,
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A128GCM" => Ok(Self::A128Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            "A128CBC-HS256" => Ok(Self::A128CbcHs256),
            "A256CBC-HS512" => Ok(Self::A256CbcHs512),
            other => Err(other.to_string()),
        }
    }
}
