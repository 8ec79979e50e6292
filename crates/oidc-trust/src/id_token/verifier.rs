//! ID token verifier
//!
//! One verifier per (issuer, client) pair, built in exactly one of four
//! modes. The mode decides which token variants are accepted:
//!
//! - [`IdTokenVerifier::plain`]: unsecured tokens only
//! - [`IdTokenVerifier::signed`] / [`IdTokenVerifier::hmac`]: signed tokens only
//! - [`IdTokenVerifier::signed_and_encrypted`]: encrypted tokens wrapping a
//!   signed token only
//!
//! A verifier holds only immutable configuration and can be shared freely.

use std::sync::Arc;

use jsonwebtoken::Algorithm;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::claims::IdTokenClaims;
use super::claims_verifier::IdTokenClaimsVerifier;
use crate::claims::ClaimsSet;
use crate::config::{ClaimsPolicy, JwkSetCacheConfig};
use crate::error::{ConfigError, ErrorKind};
use crate::identifier::{ClientId, Issuer, Nonce};
use crate::jose::{JoseError, JoseObject, JoseProcessor, ParseError};
use crate::keys::{
    HmacKeySelector, JweKeySelector, JwkSetSource, JwsKeySelector, JwsVerificationKeySelector,
    RemoteJwkSet,
};
use crate::policy::{BadClaims, now_epoch_secs};
use crate::retrieval::ResourceRetriever;
use crate::secret::Secret;

/// ID token rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdTokenError {
    /// Not a JOSE object
    #[error("Invalid ID token: {0}")]
    Malformed(ParseError),

    /// Signature or decryption failure, or a variant this verifier refuses
    #[error("Invalid ID token: {0}")]
    Jose(JoseError),

    /// Claims policy violation
    #[error("Invalid ID token: {0}")]
    Claims(#[from] BadClaims),
}

impl IdTokenError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(e) => e.kind(),
            Self::Jose(e) => e.kind(),
            Self::Claims(e) => e.kind(),
        }
    }
}

impl From<JoseError> for IdTokenError {
    fn from(e: JoseError) -> Self {
        match e {
            JoseError::Malformed(parse) => Self::Malformed(parse),
            other => Self::Jose(other),
        }
    }
}

impl From<ParseError> for IdTokenError {
    fn from(e: ParseError) -> Self {
        Self::Malformed(e)
    }
}

/// Verifies ID tokens issued by one provider to one client
///
/// # Example
///
/// ```rust
/// use oidc_trust::id_token::IdTokenVerifier;
/// use oidc_trust::identifier::{ClientId, Issuer};
///
/// # tokio_test::block_on(async {
/// let verifier = IdTokenVerifier::plain(
///     Issuer::new("https://c2id.com").unwrap(),
///     ClientId::new("123").unwrap(),
/// );
///
/// // {"alg":"none"} . {"iss":"https://c2id.com","sub":"alice","aud":"123","exp":2,"iat":1}
/// let token = "eyJhbGciOiJub25lIn0.eyJpc3MiOiJodHRwczovL2MyaWQuY29tIiwic3ViIjoiYWxpY2UiLCJhdWQiOiIxMjMiLCJleHAiOjIsImlhdCI6MX0.";
/// let claims = verifier.verify_at(token, None, 1).await.unwrap();
/// assert_eq!(claims.subject.as_str(), "alice");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct IdTokenVerifier {
    issuer: Issuer,
    client_id: ClientId,
    processor: JoseProcessor,
    policy: ClaimsPolicy,
}

impl IdTokenVerifier {
    fn with_processor(issuer: Issuer, client_id: ClientId, processor: JoseProcessor) -> Self {
        Self {
            issuer,
            client_id,
            processor,
            policy: ClaimsPolicy::default(),
        }
    }

    /// Accept unsecured ID tokens only
    pub fn plain(issuer: Issuer, client_id: ClientId) -> Self {
        Self::with_processor(issuer, client_id, JoseProcessor::unsecured())
    }

    /// Accept ID tokens signed with `alg` (RSA or EC) by a key from `source`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlgorithmNotPermitted`] unless `alg` is an RSA or
    /// EC algorithm.
    pub fn signed(
        issuer: Issuer,
        client_id: ClientId,
        alg: Algorithm,
        source: Arc<dyn JwkSetSource>,
    ) -> Result<Self, ConfigError> {
        let selector = JwsVerificationKeySelector::new(issuer.as_str(), alg, source)?;
        Ok(Self::with_processor(
            issuer,
            client_id,
            JoseProcessor::signed(Arc::new(selector)),
        ))
    }

    /// [`IdTokenVerifier::signed`] with the provider's JWK set fetched from
    /// `jwks_uri` and cached
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non RSA/EC algorithm.
    pub fn with_jwk_set_uri(
        issuer: Issuer,
        client_id: ClientId,
        alg: Algorithm,
        jwks_uri: Url,
        retriever: Arc<dyn ResourceRetriever>,
        cache: JwkSetCacheConfig,
    ) -> Result<Self, ConfigError> {
        let source = RemoteJwkSet::with_retriever(jwks_uri, retriever, cache);
        Self::signed(issuer, client_id, alg, Arc::new(source))
    }

    /// Accept ID tokens MACed with `alg` using the client secret
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-HMAC algorithm or a secret under
    /// 256 bits.
    pub fn hmac(
        issuer: Issuer,
        client_id: ClientId,
        alg: Algorithm,
        client_secret: Secret,
    ) -> Result<Self, ConfigError> {
        let selector = HmacKeySelector::new(alg, client_secret)?;
        Ok(Self::with_processor(
            issuer,
            client_id,
            JoseProcessor::signed(Arc::new(selector)),
        ))
    }

    /// Accept only encrypted ID tokens wrapping a signed ID token
    pub fn signed_and_encrypted(
        issuer: Issuer,
        client_id: ClientId,
        jws: Arc<dyn JwsKeySelector>,
        jwe: Arc<dyn JweKeySelector>,
    ) -> Self {
        Self::with_processor(
            issuer,
            client_id,
            JoseProcessor::signed_and_encrypted(jws, jwe),
        )
    }

    /// Replace the claims policy
    #[must_use]
    pub fn with_claims_policy(mut self, policy: ClaimsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Expected issuer
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// Client the tokens are issued to
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Verify a compact ID token against the current time
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Malformed`] for structural problems,
    /// [`IdTokenError::Jose`] for cryptographic failures and
    /// [`IdTokenError::Claims`] for claims policy violations.
    pub async fn verify(
        &self,
        id_token: &str,
        expected_nonce: Option<&Nonce>,
    ) -> Result<IdTokenClaims, IdTokenError> {
        self.verify_at(id_token, expected_nonce, now_epoch_secs())
            .await
    }

    /// Verify a compact ID token against `now`, in seconds since the epoch
    ///
    /// # Errors
    ///
    /// See [`IdTokenVerifier::verify`].
    pub async fn verify_at(
        &self,
        id_token: &str,
        expected_nonce: Option<&Nonce>,
        now: i64,
    ) -> Result<IdTokenClaims, IdTokenError> {
        let object = JoseObject::parse(id_token)?;
        self.verify_object_at(&object, expected_nonce, now).await
    }

    /// Verify an already parsed ID token against the current time
    ///
    /// # Errors
    ///
    /// See [`IdTokenVerifier::verify`].
    pub async fn verify_object(
        &self,
        id_token: &JoseObject,
        expected_nonce: Option<&Nonce>,
    ) -> Result<IdTokenClaims, IdTokenError> {
        self.verify_object_at(id_token, expected_nonce, now_epoch_secs())
            .await
    }

    async fn verify_object_at(
        &self,
        id_token: &JoseObject,
        expected_nonce: Option<&Nonce>,
        now: i64,
    ) -> Result<IdTokenClaims, IdTokenError> {
        let verified = self.processor.process(id_token).await?;
        let claims = ClaimsSet::from_slice(&verified.payload).map_err(BadClaims::from)?;

        let result = IdTokenClaimsVerifier::new(
            self.issuer.clone(),
            self.client_id.clone(),
            expected_nonce.cloned(),
        )
        .with_policy(self.policy)
        .verify_at(&claims, now);
        if let Err(e) = &result {
            debug!(
                issuer = %self.issuer,
                client_id = %self.client_id,
                reason = e.code(),
                "ID token claims rejected"
            );
        }
        result?;

        let claims = IdTokenClaims::from_claims_set(&claims)?;
        debug!(
            issuer = %self.issuer,
            subject = %claims.subject,
            variant = ?verified.variant,
            "ID token verified"
        );
        Ok(claims)
    }
}
