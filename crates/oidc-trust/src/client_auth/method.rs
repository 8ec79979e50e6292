//! Client authentication methods and their request encodings

use std::collections::HashMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::claims::{ClaimsError, ClaimsSet};
use crate::error::ErrorKind;
use crate::identifier::ClientId;
use crate::jose::{JoseObject, JwsFamily, ParseError, SignedObject};
use crate::secret::Secret;

/// `client_assertion_type` value for JWT bearer assertions (RFC 7523)
pub const JWT_BEARER_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Registered client authentication method names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAuthMethod {
    /// `client_secret_basic`
    ClientSecretBasic,
    /// `client_secret_post`
    ClientSecretPost,
    /// `client_secret_jwt`
    ClientSecretJwt,
    /// `private_key_jwt`
    PrivateKeyJwt,
}

impl ClientAuthMethod {
    /// Registered name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
        }
    }

    /// Whether the method proves possession of the shared secret
    pub fn uses_shared_secret(self) -> bool {
        !matches!(self, Self::PrivateKeyJwt)
    }
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed client authentication in a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientAuthParseError {
    /// The request carries no client credentials
    #[error("missing client authentication")]
    Missing,

    /// Credentials were sent using more than one method
    #[error("multiple client authentication methods used")]
    MultipleMethods,

    /// The `Authorization` header is not valid HTTP Basic
    #[error("invalid HTTP Basic authorization header")]
    InvalidBasicHeader,

    /// A required parameter is absent or blank
    #[error("missing or blank {0} parameter")]
    MissingParameter(&'static str),

    /// `client_assertion_type` is not the JWT bearer type
    #[error("unsupported client_assertion_type: {0}")]
    UnsupportedAssertionType(String),

    /// `client_assertion` is not a JWS
    #[error("invalid client assertion: {0}")]
    InvalidAssertion(String),

    /// `client_id` disagrees with the assertion subject
    #[error("client_id does not match the client assertion subject")]
    ClientIdMismatch,
}

impl ClientAuthParseError {
    /// Always [`ErrorKind::Structural`]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Structural
    }
}

impl From<ParseError> for ClientAuthParseError {
    fn from(e: ParseError) -> Self {
        Self::InvalidAssertion(e.to_string())
    }
}

impl From<ClaimsError> for ClientAuthParseError {
    fn from(e: ClaimsError) -> Self {
        Self::InvalidAssertion(e.to_string())
    }
}

/// A JWT bearer client assertion, not yet verified
#[derive(Debug, Clone, PartialEq)]
pub struct JwtAssertion {
    client_id: ClientId,
    algorithm: Algorithm,
    signed: SignedObject,
    claims: ClaimsSet,
}

impl JwtAssertion {
    /// Parse a compact JWS assertion; the client ID is its `sub` claim
    ///
    /// # Errors
    ///
    /// Returns [`ClientAuthParseError::InvalidAssertion`] unless the input is
    /// a JWS with a supported algorithm and a JSON claims set naming a subject.
    pub fn parse(compact: &str) -> Result<Self, ClientAuthParseError> {
        let signed = match JoseObject::parse(compact)? {
            JoseObject::Signed(signed) => signed,
            other => {
                return Err(ClientAuthParseError::InvalidAssertion(format!(
                    "expected a signed JWT, got a {} object",
                    other.variant()
                )));
            }
        };
        let algorithm = signed.header().jws_algorithm().ok_or_else(|| {
            ClientAuthParseError::InvalidAssertion(format!(
                "unsupported algorithm {}",
                signed.header().alg
            ))
        })?;
        let claims = ClaimsSet::from_slice(signed.unverified_payload())?;
        let client_id = claims
            .subject()?
            .and_then(|sub| ClientId::new(sub).ok())
            .ok_or(ClientAuthParseError::InvalidAssertion(
                "missing subject (sub) claim".to_string(),
            ))?;
        Ok(Self {
            client_id,
            algorithm,
            signed,
            claims,
        })
    }

    /// Claimed client ID (`sub`)
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Claimed JWS algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Unverified claims
    pub fn claims(&self) -> &ClaimsSet {
        &self.claims
    }

    /// The signed object
    pub fn signed_object(&self) -> &SignedObject {
        &self.signed
    }

    /// Method implied by the algorithm family
    pub fn method(&self) -> ClientAuthMethod {
        if JwsFamily::of(self.algorithm) == JwsFamily::Hmac {
            ClientAuthMethod::ClientSecretJwt
        } else {
            ClientAuthMethod::PrivateKeyJwt
        }
    }
}

/// Client authentication presented with a token request
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAuthentication {
    /// Client ID and secret in an HTTP Basic header
    ClientSecretBasic {
        /// Claimed client
        client_id: ClientId,
        /// Presented secret
        secret: Secret,
    },
    /// Client ID and secret as form parameters
    ClientSecretPost {
        /// Claimed client
        client_id: ClientId,
        /// Presented secret
        secret: Secret,
    },
    /// JWT assertion MACed with the client secret
    ClientSecretJwt(JwtAssertion),
    /// JWT assertion signed with the client's private key
    PrivateKeyJwt(JwtAssertion),
}

impl ClientAuthentication {
    /// Claimed client ID
    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::ClientSecretBasic { client_id, .. } | Self::ClientSecretPost { client_id, .. } => {
                client_id
            }
            Self::ClientSecretJwt(assertion) | Self::PrivateKeyJwt(assertion) => {
                assertion.client_id()
            }
        }
    }

    /// Method used
    pub fn method(&self) -> ClientAuthMethod {
        match self {
            Self::ClientSecretBasic { .. } => ClientAuthMethod::ClientSecretBasic,
            Self::ClientSecretPost { .. } => ClientAuthMethod::ClientSecretPost,
            Self::ClientSecretJwt(_) => ClientAuthMethod::ClientSecretJwt,
            Self::PrivateKeyJwt(_) => ClientAuthMethod::PrivateKeyJwt,
        }
    }

    /// JWT assertion authentication from a compact JWS
    ///
    /// # Errors
    ///
    /// See [`JwtAssertion::parse`].
    pub fn from_assertion(compact: &str) -> Result<Self, ClientAuthParseError> {
        let assertion = JwtAssertion::parse(compact)?;
        Ok(match assertion.method() {
            ClientAuthMethod::ClientSecretJwt => Self::ClientSecretJwt(assertion),
            _ => Self::PrivateKeyJwt(assertion),
        })
    }

    /// `client_secret_basic` from an `Authorization` header value
    ///
    /// The client ID and secret are form-urlencoded before Base64 encoding
    /// (RFC 6749 2.3.1).
    ///
    /// # Errors
    ///
    /// Returns [`ClientAuthParseError::InvalidBasicHeader`] for anything that
    /// is not `Basic base64(id:secret)` with a non-blank client ID.
    pub fn from_basic_header(authorization: &str) -> Result<Self, ClientAuthParseError> {
        let (scheme, credentials) = authorization
            .trim()
            .split_once(' ')
            .ok_or(ClientAuthParseError::InvalidBasicHeader)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(ClientAuthParseError::InvalidBasicHeader);
        }
        let decoded = STANDARD
            .decode(credentials.trim())
            .map_err(|_| ClientAuthParseError::InvalidBasicHeader)?;
        let decoded =
            String::from_utf8(decoded).map_err(|_| ClientAuthParseError::InvalidBasicHeader)?;
        let (id, secret) = decoded
            .split_once(':')
            .ok_or(ClientAuthParseError::InvalidBasicHeader)?;

        let client_id = ClientId::new(form_decode(id)?)
            .map_err(|_| ClientAuthParseError::InvalidBasicHeader)?;
        Ok(Self::ClientSecretBasic {
            client_id,
            secret: Secret::new(form_decode(secret)?),
        })
    }

    /// Client authentication from form parameters
    ///
    /// Recognizes `client_secret_post` (`client_id` + `client_secret`) and
    /// JWT assertions (`client_assertion_type` + `client_assertion`, with an
    /// optional `client_id` that must match the assertion subject).
    ///
    /// # Errors
    ///
    /// Returns [`ClientAuthParseError::Missing`] when no credentials are
    /// present, or a more specific error for malformed ones.
    pub fn from_form_params(params: &HashMap<String, String>) -> Result<Self, ClientAuthParseError> {
        let param = |name: &str| params.get(name).map(String::as_str);

        if let Some(assertion) = param("client_assertion") {
            let assertion_type = param("client_assertion_type")
                .ok_or(ClientAuthParseError::MissingParameter("client_assertion_type"))?;
            if assertion_type != JWT_BEARER_ASSERTION_TYPE {
                return Err(ClientAuthParseError::UnsupportedAssertionType(
                    assertion_type.to_string(),
                ));
            }
            if param("client_secret").is_some() {
                return Err(ClientAuthParseError::MultipleMethods);
            }
            let auth = Self::from_assertion(assertion)?;
            if let Some(client_id) = param("client_id")
                && client_id != auth.client_id().as_str()
            {
                return Err(ClientAuthParseError::ClientIdMismatch);
            }
            return Ok(auth);
        }

        if let Some(secret) = param("client_secret") {
            let client_id = param("client_id")
                .and_then(|id| ClientId::new(id).ok())
                .ok_or(ClientAuthParseError::MissingParameter("client_id"))?;
            return Ok(Self::ClientSecretPost {
                client_id,
                secret: Secret::new(secret),
            });
        }

        Err(ClientAuthParseError::Missing)
    }

    /// Client authentication from a token request
    ///
    /// # Errors
    ///
    /// Returns [`ClientAuthParseError::MultipleMethods`] when both the header
    /// and the form carry credentials.
    pub fn parse(
        authorization: Option<&str>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ClientAuthParseError> {
        match authorization {
            Some(header) => {
                if params.contains_key("client_secret") || params.contains_key("client_assertion")
                {
                    return Err(ClientAuthParseError::MultipleMethods);
                }
                Self::from_basic_header(header)
            }
            None => Self::from_form_params(params),
        }
    }
}

fn form_decode(value: &str) -> Result<String, ClientAuthParseError> {
    urlencoding::decode(&value.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ClientAuthParseError::InvalidBasicHeader)
}
