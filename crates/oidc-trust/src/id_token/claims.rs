//! Structured ID token claims

use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::Jwk;
use serde_json::{Map, Value};

use super::hash::{AccessTokenHash, CodeHash};
use crate::claims::{ClaimsError, ClaimsSet, RESERVED_CLAIM_NAMES};
use crate::identifier::{Audience, ClientId, Issuer, Nonce, Subject};
use crate::policy::BadClaims;

/// Claims the ID token model reads into typed fields
const STANDARD_CLAIM_NAMES: [&str; 8] = [
    "auth_time", "nonce", "acr", "amr", "azp", "at_hash", "c_hash", "sub_jwk",
];

/// Claims of a verified ID token
#[derive(Debug, Clone, PartialEq)]
pub struct IdTokenClaims {
    /// Issuer (`iss`)
    pub issuer: Issuer,
    /// Subject (`sub`)
    pub subject: Subject,
    /// Audience (`aud`)
    pub audience: Vec<Audience>,
    /// Expiration time (`exp`), seconds since the epoch
    pub expiration_time: i64,
    /// Issue time (`iat`), seconds since the epoch
    pub issue_time: i64,
    /// Time of end-user authentication (`auth_time`)
    pub auth_time: Option<i64>,
    /// Nonce (`nonce`)
    pub nonce: Option<Nonce>,
    /// Authentication context class reference (`acr`)
    pub acr: Option<String>,
    /// Authentication method references (`amr`)
    pub amr: Vec<String>,
    /// Authorized party (`azp`)
    pub authorized_party: Option<ClientId>,
    /// Access token hash (`at_hash`)
    pub access_token_hash: Option<AccessTokenHash>,
    /// Authorization code hash (`c_hash`)
    pub code_hash: Option<CodeHash>,
    /// Self-issued subject public key (`sub_jwk`)
    pub subject_jwk: Option<Jwk>,
    /// All other claims
    pub custom: Map<String, Value>,
}

fn required<T>(
    value: Option<&str>,
    missing: BadClaims,
    build: impl FnOnce(&str) -> Result<T, crate::error::ConfigError>,
) -> Result<T, BadClaims> {
    let value = value.ok_or_else(|| missing.clone())?;
    build(value).map_err(|_| missing)
}

impl IdTokenClaims {
    /// Read typed claims out of a claims set
    ///
    /// # Errors
    ///
    /// Returns [`BadClaims`] when a required claim is missing or any claim
    /// has the wrong JSON shape.
    pub fn from_claims_set(claims: &ClaimsSet) -> Result<Self, BadClaims> {
        let issuer = required(claims.issuer()?, BadClaims::MissingIssuer, |s| Issuer::new(s))?;
        let subject = required(claims.subject()?, BadClaims::MissingSubject, |s| Subject::new(s))?;
        let audience = claims
            .audience()?
            .into_iter()
            .map(|aud| Audience::new(aud).map_err(|_| BadClaims::MissingAudience))
            .collect::<Result<Vec<_>, _>>()?;
        let expiration_time = claims
            .expiration_time()?
            .ok_or(BadClaims::MissingExpiration)?;
        let issue_time = claims.issue_time()?.ok_or(BadClaims::MissingIssueTime)?;

        let nonce = claims
            .string_claim("nonce")?
            .map(|n| Nonce::new(n).map_err(|_| BadClaims::MissingNonce))
            .transpose()?;
        let authorized_party = claims
            .string_claim("azp")?
            .map(|azp| {
                ClientId::new(azp).map_err(|_| BadClaims::UnexpectedAuthorizedParty(azp.into()))
            })
            .transpose()?;
        let subject_jwk = claims
            .get("sub_jwk")
            .map(|v| {
                serde_json::from_value::<Jwk>(v.clone()).map_err(|_| ClaimsError::InvalidClaim {
                    name: "sub_jwk".to_string(),
                    reason: "expected a JWK",
                })
            })
            .transpose()?;

        let custom = claims
            .as_map()
            .iter()
            .filter(|(name, _)| {
                !RESERVED_CLAIM_NAMES.contains(&name.as_str())
                    && !STANDARD_CLAIM_NAMES.contains(&name.as_str())
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            issuer,
            subject,
            audience,
            expiration_time,
            issue_time,
            auth_time: claims.numeric_date_claim("auth_time")?,
            nonce,
            acr: claims.string_claim("acr")?.map(str::to_string),
            amr: claims.string_list_claim("amr")?.unwrap_or_default(),
            authorized_party,
            access_token_hash: claims.string_claim("at_hash")?.map(AccessTokenHash::new),
            code_hash: claims.string_claim("c_hash")?.map(CodeHash::new),
            subject_jwk,
            custom,
        })
    }

    /// Check `at_hash` against the access token issued with this ID token
    ///
    /// # Errors
    ///
    /// Returns [`BadClaims::MissingAccessTokenHash`] or
    /// [`BadClaims::AccessTokenHashMismatch`].
    pub fn verify_access_token(&self, access_token: &str, alg: Algorithm) -> Result<(), BadClaims> {
        let hash = self
            .access_token_hash
            .as_ref()
            .ok_or(BadClaims::MissingAccessTokenHash)?;
        if hash.matches(access_token, alg) {
            Ok(())
        } else {
            Err(BadClaims::AccessTokenHashMismatch)
        }
    }

    /// Check `c_hash` against the authorization code issued with this ID token
    ///
    /// # Errors
    ///
    /// Returns [`BadClaims::MissingCodeHash`] or [`BadClaims::CodeHashMismatch`].
    pub fn verify_code(&self, code: &str, alg: Algorithm) -> Result<(), BadClaims> {
        let hash = self.code_hash.as_ref().ok_or(BadClaims::MissingCodeHash)?;
        if hash.matches(code, alg) {
            Ok(())
        } else {
            Err(BadClaims::CodeHashMismatch)
        }
    }
}
