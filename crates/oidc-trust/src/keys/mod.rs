//! Key material, JWK set sources and key selectors
//!
//! Selectors are the seam between the JOSE dispatcher and key material: the
//! dispatcher asks for candidates for a claimed algorithm, and the selector
//! decides whether that algorithm is acceptable for the key owner at all.

pub mod material;
pub mod matcher;
pub mod remote;
pub mod selector;
pub mod source;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;

use crate::jose::{EncryptionMethod, JoseHeader, JweAlgorithm};

pub use material::{DecryptionKey, EncryptionKey, KeyConversion, SkippedKey, VerificationKey};
pub use matcher::{JwkMatcher, KeyType};
pub use remote::{CacheStatus, RemoteJwkSet};
pub use selector::{
    HmacKeySelector, JweDecryptionKeySelector, JwsVerificationKeySelector, MIN_HMAC_SECRET_BITS,
};
pub use source::{JwkSetSource, KeySourceError, StaticJwkSet};

/// Candidate keys for verifying a JWS
#[async_trait]
pub trait JwsKeySelector: Send + Sync + std::fmt::Debug {
    /// Keys that may verify a JWS claiming `alg`
    ///
    /// Returns no keys when `alg` is not permitted or no key matches. Network
    /// failures also yield no keys.
    async fn select_jws_keys(&self, alg: Algorithm, header: &JoseHeader) -> Vec<VerificationKey>;
}

/// Candidate keys for decrypting a JWE
#[async_trait]
pub trait JweKeySelector: Send + Sync + std::fmt::Debug {
    /// Keys that may decrypt a JWE claiming `alg` and `enc`
    async fn select_jwe_keys(
        &self,
        alg: JweAlgorithm,
        enc: EncryptionMethod,
        header: &JoseHeader,
    ) -> Vec<DecryptionKey>;
}
