//! Claims policy for JWT bearer client assertions (RFC 7523 section 3)

use crate::claims::ClaimsSet;
use crate::config::ClaimsPolicy;
use crate::identifier::{Audience, ClientId};
use crate::policy::{BadClaims, check_expiration, check_not_before, now_epoch_secs};

/// How many `aud` members an assertion may carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AudiencePolicy {
    /// Exactly one member, which must be an expected audience
    #[default]
    SingleValued,
    /// Any number of members, at least one of them expected
    AnyMember,
}

/// Checks the claims of a client assertion
///
/// Checks run in order and stop at the first violation:
///
/// 1. `iss` and `sub` are present and equal
/// 2. they name the claimed client
/// 3. `aud` contains an expected audience (the token endpoint or the issuer)
/// 4. `aud` has a single member, under [`AudiencePolicy::SingleValued`]
/// 5. `exp` is present and has not passed
/// 6. `nbf`, if present, has been reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtAuthClaimsVerifier {
    expected_audience: Vec<Audience>,
    audience_policy: AudiencePolicy,
    policy: ClaimsPolicy,
}

impl JwtAuthClaimsVerifier {
    /// Verifier accepting any of `expected_audience`
    pub fn new(expected_audience: impl IntoIterator<Item = Audience>) -> Self {
        Self {
            expected_audience: expected_audience.into_iter().collect(),
            audience_policy: AudiencePolicy::default(),
            policy: ClaimsPolicy::default(),
        }
    }

    /// Replace the audience policy
    #[must_use]
    pub fn with_audience_policy(mut self, audience_policy: AudiencePolicy) -> Self {
        self.audience_policy = audience_policy;
        self
    }

    /// Replace the claims policy
    #[must_use]
    pub fn with_policy(mut self, policy: ClaimsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Accepted audience values
    pub fn expected_audience(&self) -> &[Audience] {
        &self.expected_audience
    }

    /// Audience policy in force
    pub fn audience_policy(&self) -> AudiencePolicy {
        self.audience_policy
    }

    /// Claims policy in force
    pub fn policy(&self) -> ClaimsPolicy {
        self.policy
    }

    /// Last instant, in seconds since the epoch, at which an assertion
    /// expiring at `exp` is still accepted
    pub fn accepted_until(&self, exp: i64) -> i64 {
        let skew = i64::try_from(self.policy.max_clock_skew_secs).unwrap_or(i64::MAX);
        exp.saturating_add(skew)
    }

    /// Verify against the current time
    ///
    /// # Errors
    ///
    /// Returns the first [`BadClaims`] violation found.
    pub fn verify(&self, claims: &ClaimsSet, client_id: &ClientId) -> Result<(), BadClaims> {
        self.verify_at(claims, client_id, now_epoch_secs())
    }

    /// Verify against `now`, in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Returns the first [`BadClaims`] violation found.
    pub fn verify_at(
        &self,
        claims: &ClaimsSet,
        client_id: &ClientId,
        now: i64,
    ) -> Result<(), BadClaims> {
        let skew = i64::try_from(self.policy.max_clock_skew_secs).unwrap_or(i64::MAX);

        let issuer = claims.issuer()?.ok_or(BadClaims::MissingIssuer)?;
        let subject = claims.subject()?.ok_or(BadClaims::MissingSubject)?;
        if issuer != subject {
            return Err(BadClaims::IssuerSubjectMismatch);
        }
        if subject != client_id.as_str() {
            return Err(BadClaims::UnexpectedSubject(subject.to_string()));
        }

        let audience = claims.audience()?;
        if audience.is_empty() {
            return Err(BadClaims::MissingAudience);
        }
        if !Audience::matches_any(&audience, &self.expected_audience) {
            return Err(BadClaims::UnexpectedAudience(audience));
        }
        if self.audience_policy == AudiencePolicy::SingleValued && audience.len() > 1 {
            return Err(BadClaims::MultipleAudiences);
        }

        check_expiration(claims.expiration_time()?, now, skew)?;
        check_not_before(claims.numeric_date_claim("nbf")?, now, skew)
    }
}
