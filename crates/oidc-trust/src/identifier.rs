//! Opaque identifier value types
//!
//! Every identifier is an immutable, non-blank string compared by value. The
//! subtypes add no state, only a stable [`NAME`](Issuer::NAME) (the claim or
//! parameter name they are carried in) and their own type so an issuer can
//! never be passed where a client ID is expected.
//!
//! ```rust
//! use oidc_trust::identifier::{ClientId, Nonce};
//!
//! let client = ClientId::new("123").unwrap();
//! assert_eq!(client.as_str(), "123");
//! assert!(ClientId::new("   ").is_err());
//!
//! // 32 random bytes, Base64URL-encoded without padding
//! let nonce = Nonce::random();
//! assert_eq!(nonce.as_str().len(), 43);
//! ```

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use url::Url;

use crate::error::ConfigError;

/// Default byte length of randomly generated identifiers
pub const DEFAULT_BYTE_LENGTH: usize = 32;

/// Base64URL value of `byte_len` bytes from the OS CSPRNG
pub(crate) fn random_base64url(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $param:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Claim or parameter name this identifier is carried in
            pub const NAME: &'static str = $param;

            /// Create from a value that must not be blank
            ///
            /// # Errors
            ///
            /// Returns [`ConfigError::InvalidParameter`] if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ConfigError::invalid(Self::NAME, "value must not be blank"));
                }
                Ok(Self(value))
            }

            /// Random identifier of [`DEFAULT_BYTE_LENGTH`] bytes
            pub fn random() -> Self {
                Self(random_base64url(DEFAULT_BYTE_LENGTH))
            }

            /// Random identifier of `byte_len` bytes
            ///
            /// # Errors
            ///
            /// Returns [`ConfigError::InvalidParameter`] if `byte_len` is zero.
            pub fn random_with_byte_len(byte_len: usize) -> Result<Self, ConfigError> {
                if byte_len == 0 {
                    return Err(ConfigError::invalid(Self::NAME, "byte length must be positive"));
                }
                Ok(Self(random_base64url(byte_len)))
            }

            /// The identifier value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the inner string
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Issuer identifier (`iss`), normally an https URL
    Issuer,
    "iss"
);

identifier!(
    /// Subject identifier (`sub`), local or pairwise
    Subject,
    "sub"
);

identifier!(
    /// Audience value (`aud`)
    Audience,
    "aud"
);

identifier!(
    /// OAuth 2.0 client identifier
    ClientId,
    "client_id"
);

identifier!(
    /// OpenID Connect nonce, binds an ID token to a client session
    Nonce,
    "nonce"
);

identifier!(
    /// JWT identifier (`jti`)
    JwtId,
    "jti"
);

identifier!(
    /// OAuth 2.0 state parameter
    State,
    "state"
);

identifier!(
    /// Sector identifier, the host grouping clients that share pairwise
    /// subjects
    SectorId,
    "sector_id"
);

impl SectorId {
    /// Sector of an `https` URI: its host component
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] if the URI is not `https` or
    /// has no host.
    pub fn from_uri(uri: &Url) -> Result<Self, ConfigError> {
        if uri.scheme() != "https" {
            return Err(ConfigError::invalid(Self::NAME, "URI scheme must be https"));
        }
        let host = uri
            .host_str()
            .ok_or_else(|| ConfigError::invalid(Self::NAME, "URI must contain a host"))?;
        Self::new(host)
    }
}

impl Audience {
    /// Whether any of `values` is one of the `expected` audiences
    pub fn matches_any(values: &[String], expected: &[Audience]) -> bool {
        values
            .iter()
            .any(|value| expected.iter().any(|aud| aud.as_str() == value))
    }
}

impl From<&ClientId> for Audience {
    fn from(client_id: &ClientId) -> Self {
        Self(client_id.0.clone())
    }
}

impl From<&Issuer> for Audience {
    fn from(issuer: &Issuer) -> Self {
        Self(issuer.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sector_from_uri() {
        let uri = Url::parse("https://client.example.org/sector.json").unwrap();
        assert_eq!(SectorId::from_uri(&uri).unwrap().as_str(), "client.example.org");
        let uri = Url::parse("http://client.example.org/sector.json").unwrap();
        assert!(SectorId::from_uri(&uri).is_err());
    }

    #[test]
    fn test_blank_values_rejected() {
        assert!(Issuer::new("").is_err());
        assert!(Subject::new(" \t").is_err());
        assert!(Subject::new(" alice ").is_ok());
    }

    #[test]
    fn test_value_equality_and_ordering() {
        let a = ClientId::new("a").unwrap();
        let b = ClientId::new("b").unwrap();
        assert_eq!(a, ClientId::new("a").unwrap());
        assert!(a < b);
    }

    #[test]
    fn test_random_identifiers_are_distinct() {
        let values: HashSet<String> = (0..16).map(|_| State::random().into_inner()).collect();
        assert_eq!(values.len(), 16);
    }

    #[test]
    fn test_random_with_byte_len() {
        let id = JwtId::random_with_byte_len(12).unwrap();
        assert_eq!(id.as_str().len(), 16);
        assert!(JwtId::random_with_byte_len(0).is_err());
    }

    #[test]
    fn test_serde_rejects_blank() {
        let nonce: Nonce = serde_json::from_str("\"n-0S6_WzA2Mj\"").unwrap();
        assert_eq!(nonce.as_str(), "n-0S6_WzA2Mj");
        assert!(serde_json::from_str::<Nonce>("\"\"").is_err());
    }

    #[test]
    fn test_audience_matches_any() {
        let expected = vec![Audience::new("https://c2id.com/token").unwrap()];
        assert!(Audience::matches_any(
            &["x".to_string(), "https://c2id.com/token".to_string()],
            &expected
        ));
        assert!(!Audience::matches_any(
            &["https://other.com/token".to_string()],
            &expected
        ));
    }

    #[test]
    fn test_names() {
        assert_eq!(Issuer::NAME, "iss");
        assert_eq!(ClientId::NAME, "client_id");
    }
}
