//! Client authentication verifier
//!
//! Every failure surfaces as [`InvalidClientError`], which renders only as
//! `invalid_client`. The underlying [`ClientAuthFailure`] is for logs and
//! must not be sent to the client.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use thiserror::Error;
use tracing::{debug, warn};

use super::claims_verifier::JwtAuthClaimsVerifier;
use super::credentials::{ClientCredentialsSelector, CredentialLookupError};
use super::method::{ClientAuthMethod, ClientAuthentication, JwtAssertion};
use super::replay::ExpendedJtiChecker;
use crate::error::ErrorKind;
use crate::identifier::{ClientId, JwtId};
use crate::jose::{JoseError, JoseHeader, JoseObject, JoseProcessor};
use crate::keys::{HmacKeySelector, JwsKeySelector, VerificationKey};
use crate::policy::{BadClaims, now_epoch_secs};
use crate::secret::Secret;

/// Why a client failed to authenticate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientAuthFailure {
    /// The credential store could not be consulted
    #[error(transparent)]
    Lookup(#[from] CredentialLookupError),

    /// No usable credentials are registered for the claimed client
    #[error("no registered credentials for client {0}")]
    NoRegisteredCredentials(ClientId),

    /// The presented secret matches no registered, unexpired secret
    #[error("client secret mismatch")]
    SecretMismatch,

    /// The assertion claims violate the policy
    #[error(transparent)]
    Claims(#[from] BadClaims),

    /// The assertion signature or MAC did not verify
    #[error(transparent)]
    Jose(#[from] JoseError),
}

impl ClientAuthFailure {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lookup(e) => e.kind(),
            Self::NoRegisteredCredentials(_) | Self::SecretMismatch => ErrorKind::Cryptographic,
            Self::Claims(e) => e.kind(),
            Self::Jose(e) => e.kind(),
        }
    }
}

/// Opaque client authentication rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid_client")]
pub struct InvalidClientError {
    reason: ClientAuthFailure,
}

impl InvalidClientError {
    /// Internal detail, not to be echoed to the client
    pub fn reason(&self) -> &ClientAuthFailure {
        &self.reason
    }

    /// Error class of the reason
    pub fn kind(&self) -> ErrorKind {
        self.reason.kind()
    }
}

impl From<ClientAuthFailure> for InvalidClientError {
    fn from(reason: ClientAuthFailure) -> Self {
        Self { reason }
    }
}

macro_rules! invalid_client_from {
    ($($source:ty),+) => {
        $(
            impl From<$source> for InvalidClientError {
                fn from(e: $source) -> Self {
                    Self { reason: e.into() }
                }
            }
        )+
    };
}

invalid_client_from!(CredentialLookupError, BadClaims, JoseError);

/// Fixed candidate keys for one algorithm
#[derive(Debug)]
struct BoundKeys {
    algorithm: Algorithm,
    keys: Vec<VerificationKey>,
}

#[async_trait]
impl JwsKeySelector for BoundKeys {
    async fn select_jws_keys(&self, alg: Algorithm, _header: &JoseHeader) -> Vec<VerificationKey> {
        if alg == self.algorithm {
            self.keys.clone()
        } else {
            Vec::new()
        }
    }
}

/// Verifies client authentication at a token or other protected endpoint
///
/// Keys and secrets are only ever looked up for the client the request
/// claims to be; a valid assertion for another client is rejected.
#[derive(Debug, Clone)]
pub struct ClientAuthVerifier {
    credentials: Arc<dyn ClientCredentialsSelector>,
    claims_verifier: JwtAuthClaimsVerifier,
    jti_checker: Option<Arc<dyn ExpendedJtiChecker>>,
}

impl ClientAuthVerifier {
    /// Verifier looking credentials up in `credentials` and checking
    /// assertions with `claims_verifier`
    pub fn new(
        credentials: Arc<dyn ClientCredentialsSelector>,
        claims_verifier: JwtAuthClaimsVerifier,
    ) -> Self {
        Self {
            credentials,
            claims_verifier,
            jti_checker: None,
        }
    }

    /// Reject assertions whose `jti` was already used; assertions then
    /// require a `jti`
    #[must_use]
    pub fn with_jti_checker(mut self, checker: Arc<dyn ExpendedJtiChecker>) -> Self {
        self.jti_checker = Some(checker);
        self
    }

    /// Assertion claims verifier
    pub fn claims_verifier(&self) -> &JwtAuthClaimsVerifier {
        &self.claims_verifier
    }

    /// Verify against the current time and return the authenticated client
    ///
    /// # Errors
    ///
    /// Returns [`InvalidClientError`] for any failure.
    pub async fn verify(
        &self,
        auth: &ClientAuthentication,
    ) -> Result<ClientId, InvalidClientError> {
        self.verify_at(auth, now_epoch_secs()).await
    }

    /// Verify against `now`, in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Returns [`InvalidClientError`] for any failure.
    pub async fn verify_at(
        &self,
        auth: &ClientAuthentication,
        now: i64,
    ) -> Result<ClientId, InvalidClientError> {
        let result = match auth {
            ClientAuthentication::ClientSecretBasic { client_id, secret }
            | ClientAuthentication::ClientSecretPost { client_id, secret } => {
                self.verify_secret(client_id, auth.method(), secret, now)
                    .await
            }
            ClientAuthentication::ClientSecretJwt(assertion)
            | ClientAuthentication::PrivateKeyJwt(assertion) => {
                self.verify_assertion(assertion, auth.method(), now).await
            }
        };

        match &result {
            Ok(()) => debug!(client_id = %auth.client_id(), method = %auth.method(), "Client authenticated"),
            Err(e) => debug!(
                client_id = %auth.client_id(),
                method = %auth.method(),
                reason = %e.reason(),
                "Client authentication rejected"
            ),
        }
        result.map(|()| auth.client_id().clone())
    }

    async fn registered_secrets(
        &self,
        client_id: &ClientId,
        method: ClientAuthMethod,
        now: i64,
    ) -> Result<Vec<Secret>, InvalidClientError> {
        let now = UNIX_EPOCH + Duration::from_secs(u64::try_from(now).unwrap_or(0));
        let secrets: Vec<Secret> = self
            .credentials
            .select_client_secrets(client_id, method)
            .await?
            .into_iter()
            .filter(|secret| !secret.is_expired_at(now))
            .collect();
        if secrets.is_empty() {
            return Err(ClientAuthFailure::NoRegisteredCredentials(client_id.clone()).into());
        }
        Ok(secrets)
    }

    async fn verify_secret(
        &self,
        client_id: &ClientId,
        method: ClientAuthMethod,
        presented: &Secret,
        now: i64,
    ) -> Result<(), InvalidClientError> {
        let secrets = self.registered_secrets(client_id, method, now).await?;
        // Secret equality is constant time; visit every candidate
        let matched = secrets
            .iter()
            .fold(false, |matched, secret| (secret == presented) | matched);
        if matched {
            Ok(())
        } else {
            Err(ClientAuthFailure::SecretMismatch.into())
        }
    }

    async fn verify_assertion(
        &self,
        assertion: &JwtAssertion,
        method: ClientAuthMethod,
        now: i64,
    ) -> Result<(), InvalidClientError> {
        let client_id = assertion.client_id();
        self.claims_verifier
            .verify_at(assertion.claims(), client_id, now)?;

        let alg = assertion.algorithm();
        let header = assertion.signed_object().header();
        let keys = match method {
            ClientAuthMethod::ClientSecretJwt => {
                let mut keys = Vec::new();
                for secret in self.registered_secrets(client_id, method, now).await? {
                    // Same algorithm and minimum length rules as any HMAC key
                    match HmacKeySelector::new(alg, secret) {
                        Ok(selector) => keys.extend(selector.select_jws_keys(alg, header).await),
                        Err(e) => warn!(
                            client_id = %client_id,
                            error = %e,
                            "Registered secret unusable for client_secret_jwt"
                        ),
                    }
                }
                keys
            }
            _ => {
                self.credentials
                    .select_public_keys(client_id, alg, header)
                    .await?
            }
        };

        let processor = JoseProcessor::signed(Arc::new(BoundKeys {
            algorithm: alg,
            keys,
        }));
        processor
            .process(&JoseObject::Signed(assertion.signed_object().clone()))
            .await?;

        if let Some(checker) = &self.jti_checker {
            let jti = assertion
                .claims()
                .jwt_id()
                .map_err(BadClaims::from)?
                .and_then(|jti| JwtId::new(jti).ok())
                .ok_or(BadClaims::MissingJwtId)?;
            // Remember the jti for as long as the assertion would be accepted
            let expires_at = assertion
                .claims()
                .expiration_time()
                .map_err(BadClaims::from)?
                .map_or(now, |exp| self.claims_verifier.accepted_until(exp));
            if !checker.try_expend(&jti, client_id, expires_at, now) {
                warn!(client_id = %client_id, "Replayed client assertion rejected");
                return Err(ClientAuthFailure::Claims(BadClaims::ReplayedJwtId).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_auth::{InMemoryJtiCache, StaticClientCredentials};
    use crate::claims::ClaimsSet;
    use crate::identifier::Audience;
    use jsonwebtoken::{EncodingKey, Header};

    const NOW: i64 = 1_700_000_000;
    const SECRET: &str = "f3cbb3e8e5a14b2b8e3a5f7c9d1e2f3a4b5c6d7e8f9a0b1c";
    const TOKEN_ENDPOINT: &str = "https://c2id.com/token";

    fn client() -> ClientId {
        ClientId::new("123").unwrap()
    }

    fn verifier() -> ClientAuthVerifier {
        let store = StaticClientCredentials::new().with_secret(client(), Secret::new(SECRET));
        ClientAuthVerifier::new(
            Arc::new(store),
            JwtAuthClaimsVerifier::new([Audience::new(TOKEN_ENDPOINT).unwrap()]),
        )
    }

    fn assertion(claims: &ClaimsSet, secret: &str) -> ClientAuthentication {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims.as_map(),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        ClientAuthentication::from_assertion(&token).unwrap()
    }

    fn claims() -> crate::claims::ClaimsSetBuilder {
        ClaimsSet::builder()
            .issuer("123")
            .subject("123")
            .audience([TOKEN_ENDPOINT])
            .expiration_time(NOW + 300)
            .jwt_id("a1")
    }

    #[tokio::test]
    async fn test_client_secret_basic() {
        let auth = ClientAuthentication::ClientSecretBasic {
            client_id: client(),
            secret: Secret::new(SECRET),
        };
        assert_eq!(verifier().verify_at(&auth, NOW).await.unwrap(), client());

        let auth = ClientAuthentication::ClientSecretPost {
            client_id: client(),
            secret: Secret::new("wrong"),
        };
        let err = verifier().verify_at(&auth, NOW).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid_client");
        assert_eq!(err.reason(), &ClientAuthFailure::SecretMismatch);
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let auth = ClientAuthentication::ClientSecretBasic {
            client_id: ClientId::new("456").unwrap(),
            secret: Secret::new(SECRET),
        };
        let err = verifier().verify_at(&auth, NOW).await.unwrap_err();
        assert!(matches!(
            err.reason(),
            ClientAuthFailure::NoRegisteredCredentials(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_secret_not_accepted() {
        let store = StaticClientCredentials::new().with_secret(
            client(),
            Secret::with_expiration(SECRET, UNIX_EPOCH + Duration::from_secs(1_000)),
        );
        let verifier = ClientAuthVerifier::new(
            Arc::new(store),
            JwtAuthClaimsVerifier::new([Audience::new(TOKEN_ENDPOINT).unwrap()]),
        );
        let auth = ClientAuthentication::ClientSecretBasic {
            client_id: client(),
            secret: Secret::new(SECRET),
        };
        assert!(verifier.verify_at(&auth, NOW).await.is_err());
        assert!(verifier.verify_at(&auth, 500).await.is_ok());
    }

    #[tokio::test]
    async fn test_client_secret_jwt() {
        let auth = assertion(&claims().build(), SECRET);
        assert_eq!(auth.method(), ClientAuthMethod::ClientSecretJwt);
        assert_eq!(verifier().verify_at(&auth, NOW).await.unwrap(), client());
    }

    #[tokio::test]
    async fn test_client_secret_jwt_bad_mac() {
        let auth = assertion(&claims().build(), "a-different-secret-of-sufficient-length!!");
        let err = verifier().verify_at(&auth, NOW).await.unwrap_err();
        assert_eq!(err.reason(), &ClientAuthFailure::Jose(JoseError::BadSignature));
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
    }

    #[tokio::test]
    async fn test_assertion_claims_checked_first() {
        let set = claims().audience(["https://other.example/token"]).build();
        let auth = assertion(&set, "not-the-secret-but-claims-fail-first!!!!");
        let err = verifier().verify_at(&auth, NOW).await.unwrap_err();
        assert!(matches!(
            err.reason(),
            ClientAuthFailure::Claims(BadClaims::UnexpectedAudience(_))
        ));
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[tokio::test]
    async fn test_replayed_assertion() {
        let verifier = verifier().with_jti_checker(Arc::new(InMemoryJtiCache::new()));
        let auth = assertion(&claims().build(), SECRET);
        assert!(verifier.verify_at(&auth, NOW).await.is_ok());
        let err = verifier.verify_at(&auth, NOW + 1).await.unwrap_err();
        assert_eq!(
            err.reason(),
            &ClientAuthFailure::Claims(BadClaims::ReplayedJwtId)
        );

        let set = ClaimsSet::builder()
            .issuer("123")
            .subject("123")
            .audience([TOKEN_ENDPOINT])
            .expiration_time(NOW + 300)
            .build();
        let err = verifier
            .verify_at(&assertion(&set, SECRET), NOW)
            .await
            .unwrap_err();
        assert_eq!(
            err.reason(),
            &ClientAuthFailure::Claims(BadClaims::MissingJwtId)
        );
    }

    #[tokio::test]
    async fn test_replay_within_clock_skew_after_exp() {
        let verifier = verifier().with_jti_checker(Arc::new(InMemoryJtiCache::new()));
        let auth = assertion(&claims().expiration_time(NOW).build(), SECRET);

        assert!(verifier.verify_at(&auth, NOW - 1).await.is_ok());
        // Still inside the 60 s skew window, so the claims pass
        let err = verifier.verify_at(&auth, NOW + 30).await.unwrap_err();
        assert_eq!(
            err.reason(),
            &ClientAuthFailure::Claims(BadClaims::ReplayedJwtId)
        );
        let err = verifier.verify_at(&auth, NOW + 60).await.unwrap_err();
        assert_eq!(err.reason(), &ClientAuthFailure::Claims(BadClaims::Expired));
    }

    #[tokio::test]
    async fn test_short_secret_unusable_for_client_secret_jwt() {
        let store = StaticClientCredentials::new().with_secret(client(), Secret::new("s3cret"));
        let verifier = ClientAuthVerifier::new(
            Arc::new(store),
            JwtAuthClaimsVerifier::new([Audience::new(TOKEN_ENDPOINT).unwrap()]),
        );

        let err = verifier
            .verify_at(&assertion(&claims().build(), "s3cret"), NOW)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid_client");
        assert_eq!(err.reason(), &ClientAuthFailure::Jose(JoseError::NoCandidateKeys));

        // The same secret still works for client_secret_basic
        let auth = ClientAuthentication::ClientSecretBasic {
            client_id: client(),
            secret: Secret::new("s3cret"),
        };
        assert!(verifier.verify_at(&auth, NOW).await.is_ok());
    }
}
