//! JWK selection criteria

use jsonwebtoken::Algorithm;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, PublicKeyUse};

use crate::jose::{JoseHeader, JwsFamily, jws_algorithm_name};

/// JWK key type (`kty`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// `RSA`
    Rsa,
    /// `EC`
    Ec,
    /// `oct`
    Oct,
    /// `OKP`
    Okp,
}

impl KeyType {
    /// Key type of a JWK
    pub fn of(jwk: &Jwk) -> Self {
        match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => Self::Rsa,
            AlgorithmParameters::EllipticCurve(_) => Self::Ec,
            AlgorithmParameters::OctetKey(_) => Self::Oct,
            AlgorithmParameters::OctetKeyPair(_) => Self::Okp,
        }
    }

    /// Key type that signs with `alg`
    pub fn for_jws(alg: Algorithm) -> Self {
        match JwsFamily::of(alg) {
            JwsFamily::Hmac => Self::Oct,
            JwsFamily::Rsa => Self::Rsa,
            JwsFamily::Ec => Self::Ec,
            JwsFamily::Okp => Self::Okp,
        }
    }
}

/// Criteria a JWK must meet to be a candidate key
///
/// Unset criteria match everything. `use` and `alg` are lenient: a JWK that
/// does not declare them still matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JwkMatcher {
    key_type: Option<KeyType>,
    key_id: Option<String>,
    key_use: Option<PublicKeyUse>,
    algorithm: Option<String>,
    curve: Option<EllipticCurve>,
}

impl JwkMatcher {
    /// Matcher that accepts every key
    pub fn any() -> Self {
        Self::default()
    }

    /// Matcher for the key that verifies a JWS with `alg` and `header`
    pub fn for_jws(alg: Algorithm, header: &JoseHeader) -> Self {
        let curve = match alg {
            Algorithm::ES256 => Some(EllipticCurve::P256),
            Algorithm::ES384 => Some(EllipticCurve::P384),
            _ => None,
        };
        Self {
            key_type: Some(KeyType::for_jws(alg)),
            key_id: header.kid.clone(),
            key_use: Some(PublicKeyUse::Signature),
            algorithm: Some(jws_algorithm_name(alg)),
            curve,
        }
    }

    /// Require a key type
    #[must_use]
    pub fn key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    /// Require a key ID
    #[must_use]
    pub fn key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    /// Require a key use, when the key declares one
    #[must_use]
    pub fn key_use(mut self, key_use: PublicKeyUse) -> Self {
        self.key_use = Some(key_use);
        self
    }

    /// Key ID this matcher requires, if any
    pub fn required_key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Whether `jwk` meets every criterion
    pub fn matches(&self, jwk: &Jwk) -> bool {
        if let Some(kty) = self.key_type
            && KeyType::of(jwk) != kty
        {
            return false;
        }
        if let Some(kid) = &self.key_id
            && jwk.common.key_id.as_deref() != Some(kid.as_str())
        {
            return false;
        }
        if let (Some(expected), Some(actual)) = (&self.key_use, &jwk.common.public_key_use)
            && expected != actual
        {
            return false;
        }
        if let (Some(expected), Some(actual)) = (&self.algorithm, &jwk.common.key_algorithm) {
            let actual = serde_json::to_value(actual)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string));
            if actual.as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        if let Some(curve) = &self.curve {
            return match &jwk.algorithm {
                AlgorithmParameters::EllipticCurve(params) => &params.curve == curve,
                _ => false,
            };
        }
        true
    }

    /// Every JWK in `jwks` that matches, in order
    pub fn filter<'a>(&self, jwks: impl IntoIterator<Item = &'a Jwk>) -> Vec<Jwk> {
        jwks.into_iter()
            .filter(|jwk| self.matches(jwk))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwk(value: serde_json::Value) -> Jwk {
        serde_json::from_value(value).unwrap()
    }

    fn rsa_jwk(kid: &str) -> Jwk {
        jwk(json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB"
        }))
    }

    fn ec_jwk() -> Jwk {
        jwk(json!({
            "kty": "EC",
            "crv": "P-256",
            "kid": "ec",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
        }))
    }

    #[test]
    fn test_jws_matcher_by_type_and_kid() {
        let mut header = JoseHeader::new("RS256");
        header.kid = Some("k2".into());
        let matcher = JwkMatcher::for_jws(Algorithm::RS256, &header);

        let keys = [rsa_jwk("k1"), rsa_jwk("k2"), ec_jwk()];
        let matched = matcher.filter(&keys);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].common.key_id.as_deref(), Some("k2"));
    }

    #[test]
    fn test_declared_alg_must_agree() {
        let header = JoseHeader::new("RS512");
        let matcher = JwkMatcher::for_jws(Algorithm::RS512, &header);
        assert!(!matcher.matches(&rsa_jwk("k1")));
    }

    #[test]
    fn test_curve_must_agree() {
        let header = JoseHeader::new("ES384");
        assert!(!JwkMatcher::for_jws(Algorithm::ES384, &header).matches(&ec_jwk()));
        let header = JoseHeader::new("ES256");
        assert!(JwkMatcher::for_jws(Algorithm::ES256, &header).matches(&ec_jwk()));
    }

    #[test]
    fn test_encryption_keys_not_used_for_signatures() {
        let mut enc_key = rsa_jwk("k1");
        enc_key.common.public_key_use = Some(PublicKeyUse::Encryption);
        let header = JoseHeader::new("RS256");
        assert!(!JwkMatcher::for_jws(Algorithm::RS256, &header).matches(&enc_key));
    }

    #[test]
    fn test_any_matches_everything() {
        assert!(JwkMatcher::any().matches(&ec_jwk()));
        assert!(JwkMatcher::any().matches(&rsa_jwk("x")));
    }
}
