//! Sector identifier URI validation (OpenID Connect Core 8.1)
//!
//! A client registering for pairwise subjects with a `sector_identifier_uri`
//! must host, at that URI, a JSON array containing every redirect URI it
//! registers. The sector is the URI's host.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, ErrorKind};
use crate::identifier::SectorId;
use crate::retrieval::{ResourceRetriever, RetrieveError};

/// Sector identifier validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectorError {
    /// The sector identifier URI is not https or has no host
    #[error("Invalid sector identifier URI: {0}")]
    InvalidUri(#[from] ConfigError),

    /// The document could not be fetched
    #[error("Couldn't retrieve sector identifier document: {0}")]
    Retrieve(#[from] RetrieveError),

    /// The document is not a JSON array of URIs
    #[error("Invalid sector identifier document: {0}")]
    InvalidDocument(String),

    /// A redirect URI is not listed in the document
    #[error("Redirect URI {0} not listed in sector identifier document")]
    RedirectUriNotListed(Url),
}

impl SectorError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUri(e) => e.kind(),
            Self::Retrieve(e) => e.kind(),
            Self::InvalidDocument(_) => ErrorKind::Structural,
            Self::RedirectUriNotListed(_) => ErrorKind::Policy,
        }
    }
}

/// Checks a client's redirect URIs against its sector identifier document
#[derive(Debug, Clone)]
pub struct SectorIdentifierValidator {
    retriever: Arc<dyn ResourceRetriever>,
}

impl SectorIdentifierValidator {
    /// Validator fetching documents through `retriever`
    pub fn new(retriever: Arc<dyn ResourceRetriever>) -> Self {
        Self { retriever }
    }

    /// Fetch `sector_uri` and require every one of `redirect_uris` in it
    ///
    /// Returns the sector of `sector_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`SectorError`] if the URI is not https, the document cannot
    /// be fetched or parsed, or a redirect URI is missing from it.
    pub async fn validate(
        &self,
        sector_uri: &Url,
        redirect_uris: &[Url],
    ) -> Result<SectorId, SectorError> {
        let sector = SectorId::from_uri(sector_uri)?;
        let resource = self.retriever.retrieve(sector_uri).await?;

        let listed: Vec<String> = serde_json::from_slice(&resource.content)
            .map_err(|e| SectorError::InvalidDocument(e.to_string()))?;
        let listed = listed
            .iter()
            .map(|uri| Url::parse(uri))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SectorError::InvalidDocument(format!("invalid URI: {e}")))?;

        if let Some(missing) = redirect_uris.iter().find(|uri| !listed.contains(uri)) {
            debug!(sector = %sector, redirect_uri = %missing, "Redirect URI not in sector identifier document");
            return Err(SectorError::RedirectUriNotListed(missing.clone()));
        }
        Ok(sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Resource;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FixedDocument(Result<&'static str, RetrieveError>);

    #[async_trait]
    impl ResourceRetriever for FixedDocument {
        async fn retrieve(&self, _url: &Url) -> Result<Resource, RetrieveError> {
            self.0.clone().map(|body| Resource {
                content: body.as_bytes().to_vec(),
                content_type: Some("application/json".into()),
            })
        }
    }

    fn validator(document: Result<&'static str, RetrieveError>) -> SectorIdentifierValidator {
        SectorIdentifierValidator::new(Arc::new(FixedDocument(document)))
    }

    fn sector_uri() -> Url {
        Url::parse("https://other.example.net/file_of_redirect_uris.json").unwrap()
    }

    fn uris(values: &[&str]) -> Vec<Url> {
        values.iter().map(|v| Url::parse(v).unwrap()).collect()
    }

    const DOCUMENT: &str =
        r#"["https://client.example.org/callback", "https://client.example.org/callback2"]"#;

    #[tokio::test]
    async fn test_all_redirect_uris_listed() {
        let sector = validator(Ok(DOCUMENT))
            .validate(&sector_uri(), &uris(&["https://client.example.org/callback"]))
            .await
            .unwrap();
        assert_eq!(sector.as_str(), "other.example.net");
    }

    #[tokio::test]
    async fn test_unlisted_redirect_uri() {
        let err = validator(Ok(DOCUMENT))
            .validate(
                &sector_uri(),
                &uris(&[
                    "https://client.example.org/callback",
                    "https://evil.example.com/callback",
                ]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SectorError::RedirectUriNotListed(ref uri) if uri.host_str() == Some("evil.example.com")));
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[tokio::test]
    async fn test_invalid_documents() {
        for document in [r#"{"redirect_uris":[]}"#, r#"["not a uri"]"#] {
            let err = validator(Ok(document))
                .validate(&sector_uri(), &[])
                .await
                .unwrap_err();
            assert!(matches!(err, SectorError::InvalidDocument(_)), "{document}");
        }
    }

    #[tokio::test]
    async fn test_http_sector_uri_rejected() {
        let uri = Url::parse("http://other.example.net/uris.json").unwrap();
        let err = validator(Ok(DOCUMENT)).validate(&uri, &[]).await.unwrap_err();
        assert!(matches!(err, SectorError::InvalidUri(_)));
    }

    #[tokio::test]
    async fn test_retrieval_failure() {
        let err = validator(Err(RetrieveError::Timeout))
            .validate(&sector_uri(), &[])
            .await
            .unwrap_err();
        assert_eq!(err, SectorError::Retrieve(RetrieveError::Timeout));
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
