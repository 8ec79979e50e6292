//! Compact-serialized JOSE objects
//!
//! [`JoseObject`] is the closed set of security variants a token can arrive
//! in. Parsing only establishes structure; nothing here is trusted until the
//! [`JoseProcessor`](super::JoseProcessor) has verified or decrypted it.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::algorithm::{EncryptionMethod, JweAlgorithm};
use crate::claims::ClaimsSet;
use crate::error::ErrorKind;
use crate::keys::VerificationKey;

/// Structural errors raised while parsing a compact serialization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Neither 3 (JWS / unsecured) nor 5 (JWE) dot-separated parts
    #[error("invalid JOSE object: expected 3 or 5 parts, found {0}")]
    PartCount(usize),

    /// A part is not valid unpadded Base64URL
    #[error("invalid JOSE object: {0} is not valid Base64URL")]
    Base64(&'static str),

    /// The protected header is not a JSON object with an `alg` member
    #[error("invalid JOSE header: {0}")]
    Header(String),

    /// An unsecured object carries a signature
    #[error("invalid unsecured JOSE object: signature part must be empty")]
    UnexpectedSignature,

    /// A JWE header without `enc`
    #[error("invalid JWE header: missing enc")]
    MissingEncryptionMethod,

    /// A JWS header declaring `alg` of `none` with 5 parts, or a JWE `alg` in a JWS
    #[error("invalid JOSE object: {0}")]
    Inconsistent(&'static str),
}

impl ParseError {
    /// Always [`ErrorKind::Structural`]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Structural
    }
}

/// Protected JOSE header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoseHeader {
    /// Algorithm (`alg`): a JWS algorithm, `none`, or a JWE key management algorithm
    pub alg: String,

    /// Content encryption method (`enc`), JWE only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,

    /// Key ID (`kid`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Type (`typ`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Content type (`cty`); `JWT` marks a nested object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,

    /// Compression (`zip`), JWE only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    /// All other header parameters
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl JoseHeader {
    /// Header with only `alg` set
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            enc: None,
            kid: None,
            typ: None,
            cty: None,
            zip: None,
            other: Map::new(),
        }
    }

    /// Whether this is an unsecured (`alg: none`) header
    pub fn is_unsecured(&self) -> bool {
        self.alg == "none"
    }

    /// Claimed JWS algorithm, `None` if `alg` is not a supported JWS algorithm
    pub fn jws_algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_str(&self.alg).ok()
    }

    /// Claimed JWE key management algorithm
    pub fn jwe_algorithm(&self) -> Option<JweAlgorithm> {
        self.alg.parse().ok()
    }

    /// Claimed JWE content encryption method
    pub fn encryption_method(&self) -> Option<EncryptionMethod> {
        self.enc.as_deref().and_then(|enc| enc.parse().ok())
    }

    /// Whether the payload is itself a JOSE object (`cty: JWT`)
    pub fn is_nested_jwt(&self) -> bool {
        self.cty
            .as_deref()
            .is_some_and(|cty| cty.eq_ignore_ascii_case("JWT"))
    }

    fn encode(&self) -> String {
        // A struct of strings and a JSON map always serializes
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }
}

/// Unsecured (`alg: none`) object
#[derive(Debug, Clone, PartialEq)]
pub struct PlainObject {
    header: JoseHeader,
    payload: Vec<u8>,
}

impl PlainObject {
    /// Protected header
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Unsecured compact serialization of a claims set
    pub fn serialize_claims(claims: &ClaimsSet) -> String {
        let header = JoseHeader::new("none");
        format!(
            "{}.{}.",
            header.encode(),
            URL_SAFE_NO_PAD.encode(claims.to_json())
        )
    }
}

/// Signed (JWS) object whose signature has not been checked yet
#[derive(Debug, Clone, PartialEq)]
pub struct SignedObject {
    header: JoseHeader,
    payload: Vec<u8>,
    compact: String,
}

impl SignedObject {
    /// Protected header
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    /// Unverified payload bytes
    pub fn unverified_payload(&self) -> &[u8] {
        &self.payload
    }

    /// Original compact serialization
    pub fn as_compact(&self) -> &str {
        &self.compact
    }

    /// Check the signature with `key` under the algorithm `alg`
    ///
    /// `alg` must come from configuration or from a key selector that has
    /// already matched it against its permitted set, never straight from the
    /// header. Claims are not inspected here.
    pub fn verify_signature(&self, alg: Algorithm, key: &VerificationKey) -> bool {
        let mut validation = Validation::new(alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        jsonwebtoken::decode::<Value>(&self.compact, key.decoding_key(), &validation).is_ok()
    }
}

/// Encrypted (JWE) object
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedObject {
    header: JoseHeader,
    pub(crate) protected_header: String,
    pub(crate) encrypted_key: Vec<u8>,
    pub(crate) iv: Vec<u8>,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) tag: Vec<u8>,
}

impl EncryptedObject {
    /// Protected header
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }
}

/// A parsed JOSE object
#[derive(Debug, Clone, PartialEq)]
pub enum JoseObject {
    /// Unsecured
    Plain(PlainObject),
    /// JWS
    Signed(SignedObject),
    /// JWE, possibly wrapping a nested JWS
    Encrypted(EncryptedObject),
}

impl JoseObject {
    /// Parse a compact serialization
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the input is not a structurally valid
    /// unsecured, JWS or JWE compact serialization.
    pub fn parse(compact: &str) -> Result<Self, ParseError> {
        let compact = compact.trim();
        let parts: Vec<&str> = compact.split('.').collect();
        match parts.len() {
            3 => {
                let header = decode_header(parts[0])?;
                let payload = decode_part(parts[1], "payload")?;
                if header.is_unsecured() {
                    if !parts[2].is_empty() {
                        return Err(ParseError::UnexpectedSignature);
                    }
                    Ok(Self::Plain(PlainObject { header, payload }))
                } else {
                    if header.enc.is_some() {
                        return Err(ParseError::Inconsistent("JWS header must not carry enc"));
                    }
                    decode_part(parts[2], "signature")?;
                    Ok(Self::Signed(SignedObject {
                        header,
                        payload,
                        compact: compact.to_string(),
                    }))
                }
            }
            5 => {
                let header = decode_header(parts[0])?;
                if header.is_unsecured() {
                    return Err(ParseError::Inconsistent("JWE must not use alg none"));
                }
                if header.enc.is_none() {
                    return Err(ParseError::MissingEncryptionMethod);
                }
                Ok(Self::Encrypted(EncryptedObject {
                    header,
                    protected_header: parts[0].to_string(),
                    encrypted_key: decode_part(parts[1], "encrypted key")?,
                    iv: decode_part(parts[2], "initialization vector")?,
                    ciphertext: decode_part(parts[3], "ciphertext")?,
                    tag: decode_part(parts[4], "authentication tag")?,
                }))
            }
            n => Err(ParseError::PartCount(n)),
        }
    }

    /// Protected header of whichever variant this is
    pub fn header(&self) -> &JoseHeader {
        match self {
            Self::Plain(obj) => &obj.header,
            Self::Signed(obj) => &obj.header,
            Self::Encrypted(obj) => &obj.header,
        }
    }

    /// Variant name for logging
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Plain(_) => "plain",
            Self::Signed(_) => "signed",
            Self::Encrypted(_) => "encrypted",
        }
    }
}

impl FromStr for JoseObject {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn decode_part(part: &str, name: &'static str) -> Result<Vec<u8>, ParseError> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| ParseError::Base64(name))
}

fn decode_header(part: &str) -> Result<JoseHeader, ParseError> {
    let bytes = decode_part(part, "header")?;
    serde_json::from_slice(&bytes).map_err(|e| ParseError::Header(e.to_string()))
}

pub(crate) fn encode_header(header: &JoseHeader) -> String {
    header.encode()
}
