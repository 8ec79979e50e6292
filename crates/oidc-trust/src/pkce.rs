//! Proof Key for Code Exchange (RFC 7636)
//!
//! ```rust
//! use oidc_trust::pkce::{CodeChallenge, CodeChallengeMethod, CodeVerifier};
//!
//! let verifier = CodeVerifier::new("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
//! let challenge = CodeChallenge::compute(CodeChallengeMethod::S256, &verifier);
//! assert_eq!(challenge.as_str(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::identifier::random_base64url;

/// Shortest permitted code verifier
pub const MIN_VERIFIER_LENGTH: usize = 43;

/// Longest permitted code verifier
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// Random bytes behind [`CodeVerifier::random`], giving 43 characters
const DEFAULT_VERIFIER_BYTES: usize = 32;

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// High-entropy secret the client proves possession of at the token endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Validate a verifier of 43 to 128 unreserved characters
    /// (`[A-Za-z0-9-._~]`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for other lengths or
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&value.len()) {
            return Err(ConfigError::invalid(
                "code_verifier",
                format!(
                    "length must be between {MIN_VERIFIER_LENGTH} and {MAX_VERIFIER_LENGTH} characters, got {}",
                    value.len()
                ),
            ));
        }
        if !value.chars().all(is_unreserved) {
            return Err(ConfigError::invalid(
                "code_verifier",
                "only [A-Za-z0-9-._~] characters are permitted",
            ));
        }
        Ok(Self(value))
    }

    /// Random 43-character verifier from 32 bytes of entropy
    pub fn random() -> Self {
        Self(random_base64url(DEFAULT_VERIFIER_BYTES))
    }

    /// Random verifier from `byte_len` bytes of entropy
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] unless the encoded length
    /// falls within 43 to 128 characters (32 to 96 bytes).
    pub fn random_with_byte_len(byte_len: usize) -> Result<Self, ConfigError> {
        Self::new(random_base64url(byte_len))
    }

    /// The verifier value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeVerifier([REDACTED])")
    }
}

impl FromStr for CodeVerifier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CodeVerifier {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CodeVerifier> for String {
    fn from(value: CodeVerifier) -> Self {
        value.0
    }
}

/// `code_challenge_method`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// Challenge equals the verifier; the default when the parameter is absent
    #[default]
    #[serde(rename = "plain")]
    Plain,
    /// Challenge is `Base64URL(SHA-256(verifier))`
    S256,
}

impl CodeChallengeMethod {
    /// Registered name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(ConfigError::invalid(
                "code_challenge_method",
                format!("unsupported method {other}"),
            )),
        }
    }
}

/// `code_challenge` derived from a [`CodeVerifier`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeChallenge(String);

impl CodeChallenge {
    /// Challenge for `verifier` under `method`
    pub fn compute(method: CodeChallengeMethod, verifier: &CodeVerifier) -> Self {
        match method {
            CodeChallengeMethod::Plain => Self(verifier.0.clone()),
            CodeChallengeMethod::S256 => {
                Self(URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.0.as_bytes())))
            }
        }
    }

    /// The challenge value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
