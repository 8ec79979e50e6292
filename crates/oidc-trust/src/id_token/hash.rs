//! `at_hash` and `c_hash` values (OpenID Connect Core 3.1.3.6, 3.3.2.11)
//!
//! The value is the Base64URL encoding of the left-most half of the hash of
//! the ASCII token, using the hash of the ID token's JWS algorithm.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Algorithm;
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

fn left_half_hash(alg: Algorithm, value: &str) -> String {
    use Algorithm::*;
    let digest: Vec<u8> = if matches!(alg, HS384 | RS384 | PS384 | ES384) {
        Sha384::digest(value.as_bytes()).to_vec()
    } else if matches!(alg, HS512 | RS512 | PS512 | EdDSA) {
        Sha512::digest(value.as_bytes()).to_vec()
    } else {
        Sha256::digest(value.as_bytes()).to_vec()
    };
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

macro_rules! token_hash {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Hash of `token` for an ID token signed with `alg`
            pub fn compute(token: &str, alg: Algorithm) -> Self {
                Self(left_half_hash(alg, token))
            }

            /// Wrap a hash value taken from a claim
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Whether this hash was computed from `token` under `alg`
            pub fn matches(&self, token: &str, alg: Algorithm) -> bool {
                let expected = left_half_hash(alg, token);
                expected.as_bytes().ct_eq(self.0.as_bytes()).into()
            }

            /// Encoded value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

token_hash!(
    /// Access token hash (`at_hash`)
    AccessTokenHash
);

token_hash!(
    /// Authorization code hash (`c_hash`)
    CodeHash
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_hash_vector() {
        let hash = AccessTokenHash::compute(
            "jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y",
            Algorithm::RS256,
        );
        assert_eq!(hash.as_str(), "77QmUPtjPfzWtF2AnpK9RQ");
    }

    #[test]
    fn test_code_hash_vector() {
        let hash = CodeHash::new("LDktKdoQak3Pk0cnXxCltA");
        assert!(hash.matches(
            "Qcb0Orv1zh30vL1MPRsbm-diHiMwcLyZvn1arpZv-Jxf_11jnpEX3Tgfvk",
            Algorithm::RS256
        ));
        assert!(!hash.matches("other-code", Algorithm::RS256));
    }

    #[test]
    fn test_hash_length_follows_algorithm() {
        assert_eq!(AccessTokenHash::compute("t", Algorithm::ES256).as_str().len(), 22);
        assert_eq!(AccessTokenHash::compute("t", Algorithm::RS384).as_str().len(), 32);
        assert_eq!(AccessTokenHash::compute("t", Algorithm::HS512).as_str().len(), 43);
    }
}
