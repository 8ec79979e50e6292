//! Property-based tests for the deterministic codecs
//!
//! Uses proptest to verify invariants of:
//! - Pairwise subject codecs (determinism, round trip, sector separation)
//! - PKCE challenge derivation
//! - Clock skew boundaries of the claims verifiers

use proptest::prelude::*;

use oidc_trust::claims::ClaimsSet;
use oidc_trust::config::ClaimsPolicy;
use oidc_trust::id_token::IdTokenClaimsVerifier;
use oidc_trust::identifier::{ClientId, Issuer, SectorId, Subject};
use oidc_trust::pairwise::{
    EncryptedPairwiseCodec, HashedPairwiseCodec, PairwiseError, PairwiseSubjectCodec,
};
use oidc_trust::pkce::{CodeChallenge, CodeChallengeMethod, CodeVerifier};
use oidc_trust::policy::BadClaims;

// =============================================================================
// STRATEGIES
// =============================================================================

fn salt_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 16)
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 24),
        prop::collection::vec(any::<u8>(), 32),
    ]
}

/// Hosts, including separators and escape characters
fn sector_strategy() -> impl Strategy<Value = SectorId> {
    r"[a-z0-9|\\][a-z0-9.|\\-]{0,40}"
        .prop_map(|host| SectorId::new(host).expect("non-blank sector"))
}

/// Local subjects, including separators and escape characters
fn subject_strategy() -> impl Strategy<Value = Subject> {
    r"[A-Za-z0-9_@|\\][A-Za-z0-9_@.|\\ -]{0,60}"
        .prop_map(|sub| Subject::new(sub).expect("non-blank subject"))
}

// =============================================================================
// PAIRWISE SUBJECT PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the hashed codec is deterministic
    #[test]
    fn prop_hashed_codec_deterministic(
        salt in salt_strategy(),
        sector in sector_strategy(),
        subject in subject_strategy(),
    ) {
        let codec = HashedPairwiseCodec::new(salt.clone()).unwrap();
        let again = HashedPairwiseCodec::new(salt).unwrap();
        prop_assert_eq!(
            codec.encode(&sector, &subject).unwrap(),
            again.encode(&sector, &subject).unwrap()
        );
    }

    /// Property: the hashed codec always yields 256-bit Base64URL subjects
    /// and never decodes
    #[test]
    fn prop_hashed_codec_one_way(
        salt in salt_strategy(),
        sector in sector_strategy(),
        subject in subject_strategy(),
    ) {
        let codec = HashedPairwiseCodec::new(salt).unwrap();
        let pairwise = codec.encode(&sector, &subject).unwrap();
        prop_assert_eq!(pairwise.as_str().len(), 43);
        prop_assert_eq!(codec.decode(&pairwise), Err(PairwiseError::DecodingNotSupported));
    }

    /// Property: distinct sectors see distinct subjects for the same user
    #[test]
    fn prop_hashed_codec_separates_sectors(
        salt in salt_strategy(),
        subject in subject_strategy(),
    ) {
        let codec = HashedPairwiseCodec::new(salt).unwrap();
        let a = SectorId::new("rp-a.example.com").unwrap();
        let b = SectorId::new("rp-b.example.com").unwrap();
        prop_assert_ne!(
            codec.encode(&a, &subject).unwrap(),
            codec.encode(&b, &subject).unwrap()
        );
    }

    /// Property: the encrypted codec round-trips, escaped `|` and `\` included
    #[test]
    fn prop_encrypted_codec_round_trip(
        salt in salt_strategy(),
        key in key_strategy(),
        sector in sector_strategy(),
        subject in subject_strategy(),
    ) {
        let codec = EncryptedPairwiseCodec::new(salt, key).unwrap();
        let pairwise = codec.encode(&sector, &subject).unwrap();
        prop_assert_eq!(&pairwise, &codec.encode(&sector, &subject).unwrap());
        prop_assert_eq!(codec.decode(&pairwise).unwrap(), (sector, subject));
    }

    /// Property: decoding arbitrary bytes never panics
    #[test]
    fn prop_encrypted_codec_rejects_garbage(
        salt in salt_strategy(),
        garbage in prop::collection::vec(any::<u8>(), 1..1024),
    ) {
        use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

        let codec = EncryptedPairwiseCodec::new(salt, vec![7u8; 16]).unwrap();
        let pairwise = Subject::new(URL_SAFE_NO_PAD.encode(&garbage)).unwrap();
        // Random bytes almost never decrypt; either way decoding must not panic
        let _ = codec.decode(&pairwise);
    }
}

// =============================================================================
// PKCE PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: plain challenges equal the verifier
    #[test]
    fn prop_plain_challenge_is_verifier(verifier in "[A-Za-z0-9._~-]{43,128}") {
        let verifier = CodeVerifier::new(verifier).unwrap();
        let challenge = CodeChallenge::compute(CodeChallengeMethod::Plain, &verifier);
        prop_assert_eq!(challenge.as_str(), verifier.as_str());
    }

    /// Property: S256 challenges are 43-character Base64URL strings
    #[test]
    fn prop_s256_challenge_shape(verifier in "[A-Za-z0-9._~-]{43,128}") {
        let verifier = CodeVerifier::new(verifier).unwrap();
        let challenge = CodeChallenge::compute(CodeChallengeMethod::S256, &verifier);
        prop_assert_eq!(challenge.as_str().len(), 43);
        prop_assert!(challenge
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    /// Property: verifiers outside 43..=128 characters are refused
    #[test]
    fn prop_verifier_length_bounds(len in 0usize..200) {
        let result = CodeVerifier::new("a".repeat(len));
        prop_assert_eq!(result.is_ok(), (43..=128).contains(&len));
    }
}

// =============================================================================
// CLAIMS POLICY PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: exp is accepted exactly while exp + skew > now
    #[test]
    fn prop_expiration_boundary(skew in 0u64..600, offset in -1200i64..1200) {
        let now = 1_700_000_000i64;
        let exp = now + offset;
        let claims = ClaimsSet::builder()
            .issuer("https://c2id.com")
            .subject("alice")
            .audience(["123"])
            .expiration_time(exp)
            .issue_time(now - 1200)
            .build();
        let verifier = IdTokenClaimsVerifier::new(
            Issuer::new("https://c2id.com").unwrap(),
            ClientId::new("123").unwrap(),
            None,
        )
        .with_policy(ClaimsPolicy { max_clock_skew_secs: skew });

        let result = verifier.verify_at(&claims, now);
        if exp + skew as i64 > now {
            prop_assert_eq!(result, Ok(()));
        } else {
            prop_assert_eq!(result, Err(BadClaims::Expired));
        }
    }
}
