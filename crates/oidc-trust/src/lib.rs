//! # OIDC Trust - Token & Assertion Verification Engine
//!
//! Decides whether a cryptographically secured OAuth 2.0 / OpenID Connect
//! artifact may be trusted: ID tokens, client authentication assertions and
//! pairwise subject identifiers.
//!
//! ## Design Principles
//!
//! - **Fail Closed**: any doubt about a token is a rejection; a stale key
//!   cache may refuse a good token but never accepts a forged one
//! - **Algorithm Binding**: the algorithm a key is used with is always
//!   checked against configuration, never taken from the token header alone
//! - **Immutable Verifiers**: verifiers hold only configuration and are shared
//!   freely between tasks; the remote JWK set cache is the only mutable state
//! - **Distinguishable Failures**: structural, cryptographic and policy
//!   failures carry an [`ErrorKind`] so callers can retry, reject or alert
//!
//! ## Architecture
//!
//! - [`identifier`] - Issuer, subject, audience, client ID and other value types
//! - [`secret`] - Shared secrets with expiry and constant-time comparison
//! - [`claims`] - Ordered JWT claims sets
//! - [`jose`] - JOSE parsing, JWE, and the decode dispatcher
//! - [`keys`] - JWK set sources (static and cached remote) and key selectors
//! - [`retrieval`] - Bounded HTTP retrieval
//! - [`id_token`] - ID token claims verification and the ID token verifier
//! - [`client_auth`] - Client authentication parsing and verification
//! - [`pairwise`] - Pairwise subject codecs
//! - [`sector`] - Sector identifier URI validation
//! - [`pkce`] - PKCE code verifiers and challenges
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jsonwebtoken::Algorithm;
//! use oidc_trust::config::JwkSetCacheConfig;
//! use oidc_trust::id_token::IdTokenVerifier;
//! use oidc_trust::identifier::{ClientId, Issuer, Nonce};
//! use oidc_trust::retrieval::HttpResourceRetriever;
//! use url::Url;
//!
//! # async fn example(id_token: &str, nonce: &Nonce) -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = IdTokenVerifier::with_jwk_set_uri(
//!     Issuer::new("https://c2id.com")?,
//!     ClientId::new("123")?,
//!     Algorithm::RS256,
//!     Url::parse("https://c2id.com/jwks.json")?,
//!     Arc::new(HttpResourceRetriever::new()?),
//!     JwkSetCacheConfig::default(),
//! )?;
//!
//! let claims = verifier.verify(id_token, Some(nonce)).await?;
//! println!("Authenticated {}", claims.subject);
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards Compliance
//!
//! - **RFC 7515 / 7516 / 7519** - JWS, JWE and JWT
//! - **RFC 6749** - OAuth 2.0 client authentication
//! - **RFC 7523** - JWT bearer client assertions
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **OpenID Connect Core 1.0** - ID token validation, pairwise subjects

pub mod claims;
pub mod client_auth;
pub mod config;
pub mod error;
pub mod id_token;
pub mod identifier;
pub mod jose;
pub mod keys;
pub mod pairwise;
pub mod pkce;
pub mod policy;
pub mod retrieval;
pub mod sector;
pub mod secret;

mod cipher;

#[doc(inline)]
pub use error::{ConfigError, ErrorKind};

#[doc(inline)]
pub use policy::BadClaims;

#[doc(inline)]
pub use id_token::{IdTokenClaims, IdTokenError, IdTokenVerifier};

#[doc(inline)]
pub use client_auth::{ClientAuthVerifier, ClientAuthentication, InvalidClientError};
