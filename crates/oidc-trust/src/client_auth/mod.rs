//! Client authentication (RFC 6749 2.3, RFC 7523, OpenID Connect Core 9)
//!
//! [`ClientAuthentication`] is parsed from a token request, then
//! [`ClientAuthVerifier`] checks it against the credentials registered for
//! the claimed client and returns the authenticated [`ClientId`].
//!
//! [`ClientId`]: crate::identifier::ClientId

mod claims_verifier;
mod credentials;
mod method;
mod replay;
mod verifier;

pub use claims_verifier::{AudiencePolicy, JwtAuthClaimsVerifier};
pub use credentials::{
    ClientCredentialsSelector, CredentialLookupError, RegisteredClient, StaticClientCredentials,
};
pub use method::{
    ClientAuthMethod, ClientAuthParseError, ClientAuthentication, JWT_BEARER_ASSERTION_TYPE,
    JwtAssertion,
};
pub use replay::{ExpendedJtiChecker, InMemoryJtiCache};
pub use verifier::{ClientAuthFailure, ClientAuthVerifier, InvalidClientError};
