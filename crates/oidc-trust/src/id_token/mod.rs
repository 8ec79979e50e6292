//! ID token verification
//!
//! [`IdTokenVerifier`] composes the JOSE dispatcher with the
//! [`IdTokenClaimsVerifier`] and returns typed [`IdTokenClaims`]. Failures
//! stay distinguishable: [`IdTokenError::kind`] tells a malformed token from
//! a cryptographic failure from a claims policy violation.

mod claims;
mod claims_verifier;
mod hash;
mod verifier;

pub use claims::IdTokenClaims;
pub use claims_verifier::IdTokenClaimsVerifier;
pub use hash::{AccessTokenHash, CodeHash};
pub use verifier::{IdTokenError, IdTokenVerifier};
