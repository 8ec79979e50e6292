//! JWT claims sets (RFC 7519)
//!
//! [`ClaimsSet`] is an insertion-ordered map from claim name to JSON value.
//! It is built from six reserved claims (`iss`, `sub`, `aud`, `exp`, `iat`,
//! `jti`) plus free-form custom claims. The builder refuses reserved names as
//! custom claims so a custom value can never shadow a registered one.
//!
//! ```rust
//! use oidc_trust::claims::ClaimsSet;
//!
//! let claims = ClaimsSet::builder()
//!     .issuer("https://c2id.com")
//!     .subject("alice")
//!     .audience(["123"])
//!     .expiration_time(1_700_000_600)
//!     .issue_time(1_700_000_000)
//!     .claim("nonce", "xyz")
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(claims.subject().unwrap(), Some("alice"));
//! assert_eq!(claims.audience().unwrap(), vec!["123".to_string()]);
//! assert!(ClaimsSet::builder().claim("exp", 0).is_err());
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ErrorKind;

/// Issuer claim name
pub const ISSUER: &str = "iss";
/// Subject claim name
pub const SUBJECT: &str = "sub";
/// Audience claim name
pub const AUDIENCE: &str = "aud";
/// Expiration time claim name
pub const EXPIRATION_TIME: &str = "exp";
/// Issue time claim name
pub const ISSUE_TIME: &str = "iat";
/// JWT ID claim name
pub const JWT_ID: &str = "jti";

/// Claim names that cannot be set as custom claims
pub const RESERVED_CLAIM_NAMES: [&str; 6] =
    [ISSUER, SUBJECT, AUDIENCE, EXPIRATION_TIME, ISSUE_TIME, JWT_ID];

/// Claims parsing and construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// The payload is not valid JSON
    #[error("invalid claims JSON: {0}")]
    Json(String),

    /// The payload is valid JSON but not an object
    #[error("claims set must be a JSON object")]
    NotAnObject,

    /// A claim is present with the wrong JSON shape
    #[error("invalid {name} claim: {reason}")]
    InvalidClaim {
        /// Claim name
        name: String,
        /// Expected shape
        reason: &'static str,
    },

    /// A reserved name was used for a custom claim
    #[error("reserved claim name {0} cannot be set as a custom claim")]
    ReservedName(String),
}

impl ClaimsError {
    /// Shape errors are structural; reserved names are a caller bug
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReservedName(_) => ErrorKind::Configuration,
            _ => ErrorKind::Structural,
        }
    }

    fn invalid(name: &str, reason: &'static str) -> Self {
        Self::InvalidClaim {
            name: name.to_string(),
            reason,
        }
    }
}

/// Ordered JWT claims set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimsSet {
    claims: Map<String, Value>,
}

impl ClaimsSet {
    /// Start building a claims set
    pub fn builder() -> ClaimsSetBuilder {
        ClaimsSetBuilder::default()
    }

    /// Parse a JSON object payload
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::Json`] for invalid JSON and
    /// [`ClaimsError::NotAnObject`] for any other JSON value.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ClaimsError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ClaimsError::Json(e.to_string()))?;
        match value {
            Value::Object(claims) => Ok(Self { claims }),
            _ => Err(ClaimsError::NotAnObject),
        }
    }

    /// Parse a JSON object string
    ///
    /// # Errors
    ///
    /// See [`ClaimsSet::from_slice`].
    pub fn parse(json: &str) -> Result<Self, ClaimsError> {
        Self::from_slice(json.as_bytes())
    }

    /// Wrap an existing JSON object
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Raw claim value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Whether a claim is present (JSON `null` counts as absent)
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_null())
    }

    /// String claim
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if present but not a string.
    pub fn string_claim(&self, name: &str) -> Result<Option<&str>, ClaimsError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(ClaimsError::invalid(name, "expected a string")),
        }
    }

    /// String-or-array-of-strings claim, e.g. `aud` or `amr`
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if present with any other shape.
    pub fn string_list_claim(&self, name: &str) -> Result<Option<Vec<String>>, ClaimsError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ClaimsError::invalid(name, "expected an array of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(ClaimsError::invalid(
                name,
                "expected a string or an array of strings",
            )),
        }
    }

    /// Whole-second NumericDate claim
    ///
    /// Fractional values are truncated toward negative infinity.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if present but not a number.
    pub fn numeric_date_claim(&self, name: &str) -> Result<Option<i64>, ClaimsError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))
                .map(Some)
                .ok_or_else(|| ClaimsError::invalid(name, "expected a NumericDate")),
            Some(_) => Err(ClaimsError::invalid(name, "expected a NumericDate")),
        }
    }

    /// Issuer (`iss`)
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if not a string.
    pub fn issuer(&self) -> Result<Option<&str>, ClaimsError> {
        self.string_claim(ISSUER)
    }

    /// Subject (`sub`)
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if not a string.
    pub fn subject(&self) -> Result<Option<&str>, ClaimsError> {
        self.string_claim(SUBJECT)
    }

    /// Audience (`aud`), empty when absent
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if neither a string nor an array
    /// of strings.
    pub fn audience(&self) -> Result<Vec<String>, ClaimsError> {
        Ok(self.string_list_claim(AUDIENCE)?.unwrap_or_default())
    }

    /// Expiration time (`exp`) in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if not a number.
    pub fn expiration_time(&self) -> Result<Option<i64>, ClaimsError> {
        self.numeric_date_claim(EXPIRATION_TIME)
    }

    /// Issue time (`iat`) in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if not a number.
    pub fn issue_time(&self) -> Result<Option<i64>, ClaimsError> {
        self.numeric_date_claim(ISSUE_TIME)
    }

    /// JWT ID (`jti`)
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::InvalidClaim`] if not a string.
    pub fn jwt_id(&self) -> Result<Option<&str>, ClaimsError> {
        self.string_claim(JWT_ID)
    }

    /// Claims that are not reserved, in insertion order
    pub fn custom_claims(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.claims
            .iter()
            .filter(|(name, _)| !RESERVED_CLAIM_NAMES.contains(&name.as_str()))
    }

    /// All claims
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Consume into the underlying JSON object
    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }

    /// Compact JSON serialization
    pub fn to_json(&self) -> String {
        Value::Object(self.claims.clone()).to_string()
    }
}

/// Builder for [`ClaimsSet`]
#[derive(Debug, Clone, Default)]
pub struct ClaimsSetBuilder {
    claims: Map<String, Value>,
}

impl ClaimsSetBuilder {
    /// Set `iss`
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims
            .insert(ISSUER.to_string(), Value::String(issuer.into()));
        self
    }

    /// Set `sub`
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.claims
            .insert(SUBJECT.to_string(), Value::String(subject.into()));
        self
    }

    /// Set `aud`; a single audience is serialized as a plain string
    pub fn audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<Value> = audience
            .into_iter()
            .map(|a| Value::String(a.into()))
            .collect();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        self.claims.insert(AUDIENCE.to_string(), value);
        self
    }

    /// Set `exp` in seconds since the epoch
    pub fn expiration_time(mut self, exp: i64) -> Self {
        self.claims
            .insert(EXPIRATION_TIME.to_string(), Value::from(exp));
        self
    }

    /// Set `iat` in seconds since the epoch
    pub fn issue_time(mut self, iat: i64) -> Self {
        self.claims.insert(ISSUE_TIME.to_string(), Value::from(iat));
        self
    }

    /// Set `jti`
    pub fn jwt_id(mut self, jti: impl Into<String>) -> Self {
        self.claims
            .insert(JWT_ID.to_string(), Value::String(jti.into()));
        self
    }

    /// Set a custom claim
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::ReservedName`] for any of
    /// [`RESERVED_CLAIM_NAMES`].
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ClaimsError> {
        if RESERVED_CLAIM_NAMES.contains(&name) {
            return Err(ClaimsError::ReservedName(name.to_string()));
        }
        self.claims.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Finish building
    pub fn build(self) -> ClaimsSet {
        ClaimsSet {
            claims: self.claims,
        }
    }
}
