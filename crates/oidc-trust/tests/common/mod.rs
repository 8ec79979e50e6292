//! Common test utilities for integration tests
//!
//! This module provides a mock OpenID provider (JWK set endpoint), RSA test
//! keys and helpers for minting signed ID tokens and client assertions.

#![allow(dead_code)]

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oidc_trust::claims::{ClaimsSet, ClaimsSetBuilder};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const ISSUER: &str = "https://c2id.com";
pub const CLIENT_ID: &str = "123";
pub const TOKEN_ENDPOINT: &str = "https://c2id.com/token";

/// Current time in seconds since the epoch
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64
}

/// An RSA key pair with a key ID
pub struct TestKey {
    pub kid: &'static str,
    pub private: RsaPrivateKey,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
        let private =
            RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("RSA key generation failed");
        Self { kid, private }
    }

    pub fn public(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    /// Public JWK with `use: sig`
    pub fn jwk(&self) -> Value {
        let public = self.public();
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        })
    }

    pub fn encoding_key(&self) -> EncodingKey {
        let der = self
            .private
            .to_pkcs1_der()
            .expect("PKCS#1 encoding failed");
        EncodingKey::from_rsa_der(der.as_bytes())
    }

    /// RS256-sign `claims` with this key's `kid` in the header
    pub fn sign(&self, claims: &ClaimsSet) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_string());
        jsonwebtoken::encode(&header, claims.as_map(), &self.encoding_key()).expect("signing failed")
    }
}

/// Provider signing key, generated once per test binary
pub fn provider_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("provider-1"))
}

/// A second provider key, for rotation scenarios
pub fn rotated_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("provider-2"))
}

/// Client key used for private_key_jwt and encrypted ID tokens
pub fn client_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("client-1"))
}

/// JWK set document holding `keys`
pub fn jwk_set(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// HMAC-sign `claims` with a shared secret
pub fn sign_hmac(alg: Algorithm, claims: &ClaimsSet, secret: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(alg),
        claims.as_map(),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("signing failed")
}

/// Valid ID token claims for [`CLIENT_ID`] issued by [`ISSUER`]
pub fn id_token_claims(now: i64) -> ClaimsSetBuilder {
    ClaimsSet::builder()
        .issuer(ISSUER)
        .subject("alice")
        .audience([CLIENT_ID])
        .expiration_time(now + 600)
        .issue_time(now)
}

/// Valid client assertion claims for [`CLIENT_ID`] at [`TOKEN_ENDPOINT`]
pub fn assertion_claims(now: i64) -> ClaimsSetBuilder {
    ClaimsSet::builder()
        .issuer(CLIENT_ID)
        .subject(CLIENT_ID)
        .audience([TOKEN_ENDPOINT])
        .expiration_time(now + 300)
        .jwt_id(format!("jti-{}", rand::random::<u64>()))
}

/// Mock OpenID provider serving a JWK set
pub struct MockProvider {
    pub server: MockServer,
    pub jwks_uri: url::Url,
}

impl MockProvider {
    /// Start a provider with no mocks mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_uri = url::Url::parse(&format!("{}/jwks.json", server.uri()))
            .expect("mock server URI");
        Self { server, jwks_uri }
    }

    /// Serve `body` from the JWK set endpoint, replacing earlier mocks
    pub async fn serve_jwks(&self, body: Value) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Fail the JWK set endpoint with `status`, replacing earlier mocks
    pub async fn fail_jwks(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path("/jwks.json"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of JWK set requests received so far
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}
