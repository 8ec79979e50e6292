//! ID token claims policy (OpenID Connect Core 3.1.3.7)

use crate::claims::ClaimsSet;
use crate::config::ClaimsPolicy;
use crate::identifier::{ClientId, Issuer, Nonce};
use crate::policy::{BadClaims, check_expiration, check_issue_time, now_epoch_secs};

/// Checks the claims of an ID token issued to one client by one issuer
///
/// Checks run in a fixed order and stop at the first violation:
///
/// 1. `iss` equals the expected issuer
/// 2. `sub` is present
/// 3. `aud` contains the client ID
/// 4. with several audiences, `azp` (if present) equals the client ID
/// 5. `exp` has not passed
/// 6. `iat` is not in the future
/// 7. `nonce` equals the expected nonce, when one is expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenClaimsVerifier {
    issuer: Issuer,
    client_id: ClientId,
    nonce: Option<Nonce>,
    policy: ClaimsPolicy,
}

impl IdTokenClaimsVerifier {
    /// Verifier with the default clock skew
    pub fn new(issuer: Issuer, client_id: ClientId, nonce: Option<Nonce>) -> Self {
        Self {
            issuer,
            client_id,
            nonce,
            policy: ClaimsPolicy::default(),
        }
    }

    /// Replace the claims policy
    #[must_use]
    pub fn with_policy(mut self, policy: ClaimsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Expected issuer
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// Expected client ID
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Expected nonce
    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    /// Verify against the current time
    ///
    /// # Errors
    ///
    /// Returns the first [`BadClaims`] violation found.
    pub fn verify(&self, claims: &ClaimsSet) -> Result<(), BadClaims> {
        self.verify_at(claims, now_epoch_secs())
    }

    /// Verify against `now`, in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Returns the first [`BadClaims`] violation found.
    pub fn verify_at(&self, claims: &ClaimsSet, now: i64) -> Result<(), BadClaims> {
        let skew = i64::try_from(self.policy.max_clock_skew_secs).unwrap_or(i64::MAX);

        let issuer = claims.issuer()?.ok_or(BadClaims::MissingIssuer)?;
        if issuer != self.issuer.as_str() {
            return Err(BadClaims::UnexpectedIssuer(issuer.to_string()));
        }

        if claims.subject()?.is_none() {
            return Err(BadClaims::MissingSubject);
        }

        let audience = claims.audience()?;
        if audience.is_empty() {
            return Err(BadClaims::MissingAudience);
        }
        if !audience.iter().any(|aud| aud == self.client_id.as_str()) {
            return Err(BadClaims::UnexpectedAudience(audience));
        }

        if audience.len() > 1
            && let Some(azp) = claims.string_claim("azp")?
            && azp != self.client_id.as_str()
        {
            return Err(BadClaims::UnexpectedAuthorizedParty(azp.to_string()));
        }

        check_expiration(claims.expiration_time()?, now, skew)?;
        check_issue_time(claims.issue_time()?, now, skew)?;

        if let Some(expected) = &self.nonce {
            match claims.string_claim("nonce")? {
                None => return Err(BadClaims::MissingNonce),
                Some(nonce) if nonce != expected.as_str() => {
                    return Err(BadClaims::UnexpectedNonce(nonce.to_string()));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn verifier(nonce: Option<&str>) -> IdTokenClaimsVerifier {
        IdTokenClaimsVerifier::new(
            Issuer::new("https://c2id.com").unwrap(),
            ClientId::new("123").unwrap(),
            nonce.map(|n| Nonce::new(n).unwrap()),
        )
    }

    fn claims() -> crate::claims::ClaimsSetBuilder {
        ClaimsSet::builder()
            .issuer("https://c2id.com")
            .subject("alice")
            .audience(["123"])
            .expiration_time(NOW + 600)
            .issue_time(NOW)
    }

    #[test]
    fn test_valid_claims() {
        assert_eq!(verifier(None).verify_at(&claims().build(), NOW), Ok(()));
    }

    #[test]
    fn test_issuer_checks() {
        let set = ClaimsSet::builder().subject("alice").build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Err(BadClaims::MissingIssuer));
        let set = claims().issuer("https://evil.com").build();
        assert_eq!(
            verifier(None).verify_at(&set, NOW),
            Err(BadClaims::UnexpectedIssuer("https://evil.com".into()))
        );
    }

    #[test]
    fn test_audience_checks() {
        let set = claims().audience(["456"]).build();
        assert_eq!(
            verifier(None).verify_at(&set, NOW),
            Err(BadClaims::UnexpectedAudience(vec!["456".into()]))
        );
        let set = claims().audience(Vec::<String>::new()).build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Err(BadClaims::MissingAudience));
    }

    #[test]
    fn test_azp_with_multiple_audiences() {
        let set = claims()
            .audience(["123", "456"])
            .claim("azp", "456")
            .unwrap()
            .build();
        assert_eq!(
            verifier(None).verify_at(&set, NOW),
            Err(BadClaims::UnexpectedAuthorizedParty("456".into()))
        );

        let set = claims()
            .audience(["123", "456"])
            .claim("azp", "123")
            .unwrap()
            .build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Ok(()));
    }

    #[test]
    fn test_expiration_with_skew() {
        let set = claims().expiration_time(NOW - 59).build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Ok(()));
        let set = claims().expiration_time(NOW - 60).build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Err(BadClaims::Expired));

        let strict = verifier(None).with_policy(ClaimsPolicy {
            max_clock_skew_secs: 0,
        });
        let set = claims().expiration_time(NOW).build();
        assert_eq!(strict.verify_at(&set, NOW), Err(BadClaims::Expired));
    }

    #[test]
    fn test_issue_time_in_future() {
        let set = claims().issue_time(NOW + 120).build();
        assert_eq!(verifier(None).verify_at(&set, NOW), Err(BadClaims::IssuedInFuture));
    }

    #[test]
    fn test_nonce_checks() {
        let set = claims().build();
        assert_eq!(
            verifier(Some("abc")).verify_at(&set, NOW),
            Err(BadClaims::MissingNonce)
        );
        let set = claims().claim("nonce", "xyz").unwrap().build();
        assert_eq!(
            verifier(Some("abc")).verify_at(&set, NOW),
            Err(BadClaims::UnexpectedNonce("xyz".into()))
        );
        let set = claims().claim("nonce", "abc").unwrap().build();
        assert_eq!(verifier(Some("abc")).verify_at(&set, NOW), Ok(()));
    }

    #[test]
    fn test_checks_run_in_order() {
        // Expired and wrong audience: audience is reported first
        let set = claims()
            .audience(["456"])
            .expiration_time(NOW - 3600)
            .build();
        assert!(matches!(
            verifier(None).verify_at(&set, NOW),
            Err(BadClaims::UnexpectedAudience(_))
        ));
    }
}
