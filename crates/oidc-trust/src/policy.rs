//! Claims policy violations and time checks shared by the ID token and
//! client assertion verifiers
//!
//! Time is whole seconds since the Unix epoch. The clock skew widens both
//! boundaries:
//!
//! - `exp` is accepted while `exp + skew > now`
//! - `iat` and `nbf` are rejected once `value - skew > now`

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::claims::ClaimsError;
use crate::error::ErrorKind;

/// A claims policy violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BadClaims {
    /// The payload could not be read as a claims set
    #[error("Invalid JWT claims: {0}")]
    Malformed(#[from] ClaimsError),

    /// `iss` absent
    #[error("Missing JWT issuer (iss) claim")]
    MissingIssuer,

    /// `iss` differs from the expected issuer
    #[error("Unexpected JWT issuer: {0}")]
    UnexpectedIssuer(String),

    /// `sub` absent
    #[error("Missing JWT subject (sub) claim")]
    MissingSubject,

    /// `sub` differs from the expected subject
    #[error("Unexpected JWT subject: {0}")]
    UnexpectedSubject(String),

    /// `iss` and `sub` of a client assertion differ
    #[error("Issuer and subject in client JWT assertion must designate the same client identifier")]
    IssuerSubjectMismatch,

    /// `aud` absent or empty
    #[error("Missing JWT audience (aud) claim")]
    MissingAudience,

    /// No `aud` member is an expected audience
    #[error("Unexpected JWT audience: {0:?}")]
    UnexpectedAudience(Vec<String>),

    /// More than one `aud` member where exactly one is allowed
    #[error("Multiple JWT audiences not allowed")]
    MultipleAudiences,

    /// `azp` present but not the expected client
    #[error("Unexpected JWT authorized party (azp) claim: {0}")]
    UnexpectedAuthorizedParty(String),

    /// `exp` absent
    #[error("Missing JWT expiration (exp) claim")]
    MissingExpiration,

    /// `exp` passed
    #[error("Expired JWT")]
    Expired,

    /// `nbf` is in the future beyond the skew
    #[error("JWT before use time")]
    NotYetValid,

    /// `iat` absent
    #[error("Missing JWT issue time (iat) claim")]
    MissingIssueTime,

    /// `iat` is in the future beyond the skew
    #[error("JWT issue time ahead of current time")]
    IssuedInFuture,

    /// `nonce` absent while one is expected
    #[error("Missing JWT nonce (nonce) claim")]
    MissingNonce,

    /// `nonce` differs from the expected nonce
    #[error("Unexpected JWT nonce (nonce) claim: {0}")]
    UnexpectedNonce(String),

    /// `jti` absent where replay protection requires it
    #[error("Missing JWT ID (jti) claim")]
    MissingJwtId,

    /// `jti` was already used
    #[error("JWT ID (jti) already used")]
    ReplayedJwtId,

    /// `at_hash` absent while an access token was issued alongside
    #[error("Missing access token hash (at_hash) claim")]
    MissingAccessTokenHash,

    /// `at_hash` does not match the access token
    #[error("Access token hash (at_hash) mismatch")]
    AccessTokenHashMismatch,

    /// `c_hash` absent while a code was issued alongside
    #[error("Missing authorization code hash (c_hash) claim")]
    MissingCodeHash,

    /// `c_hash` does not match the authorization code
    #[error("Authorization code hash (c_hash) mismatch")]
    CodeHashMismatch,
}

impl BadClaims {
    /// Malformed claims are structural; everything else is a policy violation
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(e) => e.kind(),
            _ => ErrorKind::Policy,
        }
    }

    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_claims",
            Self::MissingIssuer => "missing_issuer",
            Self::UnexpectedIssuer(_) => "unexpected_issuer",
            Self::MissingSubject => "missing_subject",
            Self::UnexpectedSubject(_) => "unexpected_subject",
            Self::IssuerSubjectMismatch => "issuer_subject_mismatch",
            Self::MissingAudience => "missing_audience",
            Self::UnexpectedAudience(_) => "unexpected_audience",
            Self::MultipleAudiences => "multiple_audiences",
            Self::UnexpectedAuthorizedParty(_) => "unexpected_azp",
            Self::MissingExpiration => "missing_expiration",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::MissingIssueTime => "missing_issue_time",
            Self::IssuedInFuture => "issue_time_ahead",
            Self::MissingNonce => "missing_nonce",
            Self::UnexpectedNonce(_) => "unexpected_nonce",
            Self::MissingJwtId => "missing_jti",
            Self::ReplayedJwtId => "replayed_jti",
            Self::MissingAccessTokenHash => "missing_at_hash",
            Self::AccessTokenHashMismatch => "at_hash_mismatch",
            Self::MissingCodeHash => "missing_c_hash",
            Self::CodeHashMismatch => "c_hash_mismatch",
        }
    }
}

/// Current time in whole seconds since the epoch
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Require `exp` and check it has not passed
pub(crate) fn check_expiration(exp: Option<i64>, now: i64, skew: i64) -> Result<(), BadClaims> {
    let exp = exp.ok_or(BadClaims::MissingExpiration)?;
    if exp.saturating_add(skew) > now {
        Ok(())
    } else {
        Err(BadClaims::Expired)
    }
}

/// Require `iat` and check it is not in the future
pub(crate) fn check_issue_time(iat: Option<i64>, now: i64, skew: i64) -> Result<(), BadClaims> {
    let iat = iat.ok_or(BadClaims::MissingIssueTime)?;
    if iat.saturating_sub(skew) > now {
        Err(BadClaims::IssuedInFuture)
    } else {
        Ok(())
    }
}

/// Check an optional `nbf` has been reached
pub(crate) fn check_not_before(nbf: Option<i64>, now: i64, skew: i64) -> Result<(), BadClaims> {
    match nbf {
        Some(nbf) if nbf.saturating_sub(skew) > now => Err(BadClaims::NotYetValid),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_expiration_boundary() {
        assert_eq!(check_expiration(Some(NOW + 60), NOW, 60), Ok(()));
        assert_eq!(check_expiration(Some(NOW - 59), NOW, 60), Ok(()));
        assert_eq!(check_expiration(Some(NOW - 60), NOW, 60), Err(BadClaims::Expired));
        assert_eq!(check_expiration(Some(NOW), NOW, 0), Err(BadClaims::Expired));
        assert_eq!(check_expiration(None, NOW, 60), Err(BadClaims::MissingExpiration));
    }

    #[test]
    fn test_issue_time_boundary() {
        assert_eq!(check_issue_time(Some(NOW + 60), NOW, 60), Ok(()));
        assert_eq!(
            check_issue_time(Some(NOW + 61), NOW, 60),
            Err(BadClaims::IssuedInFuture)
        );
        assert_eq!(check_issue_time(None, NOW, 60), Err(BadClaims::MissingIssueTime));
    }

    #[test]
    fn test_not_before() {
        assert_eq!(check_not_before(None, NOW, 60), Ok(()));
        assert_eq!(check_not_before(Some(NOW + 60), NOW, 60), Ok(()));
        assert_eq!(
            check_not_before(Some(NOW + 61), NOW, 60),
            Err(BadClaims::NotYetValid)
        );
    }

    #[test]
    fn test_messages_and_codes() {
        assert_eq!(BadClaims::Expired.to_string(), "Expired JWT");
        assert_eq!(
            BadClaims::IssuedInFuture.to_string(),
            "JWT issue time ahead of current time"
        );
        assert_eq!(
            BadClaims::UnexpectedAudience(vec!["x".into()]).code(),
            "unexpected_audience"
        );
        assert_eq!(BadClaims::Expired.kind(), ErrorKind::Policy);
        assert_eq!(
            BadClaims::Malformed(ClaimsError::NotAnObject).kind(),
            ErrorKind::Structural
        );
    }
}
