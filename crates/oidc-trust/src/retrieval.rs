//! # Bounded HTTP Resource Retrieval
//!
//! The only I/O the verification engine performs goes through a
//! [`ResourceRetriever`]: remote JWK sets and sector identifier documents.
//! [`HttpResourceRetriever`] bounds every request by:
//!
//! - a connect timeout
//! - a read timeout, applied to the response head and to every body chunk
//! - a response size ceiling, enforced while the body streams in
//!
//! Redirects are not followed. Plain `http` is only accepted for loopback
//! hosts so local test servers work.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::config::RetrieverConfig;
use crate::error::ErrorKind;

/// A retrieved document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Body bytes
    pub content: Vec<u8>,
    /// `Content-Type` header value, if sent
    pub content_type: Option<String>,
}

impl Resource {
    /// Body as UTF-8 text
    pub fn text(&self) -> Result<&str, RetrieveError> {
        std::str::from_utf8(&self.content)
            .map_err(|_| RetrieveError::InvalidContent("body is not UTF-8".to_string()))
    }
}

/// Retrieval failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrieveError {
    /// The URL is not https (or http on loopback)
    #[error("URL not allowed: {0}")]
    UrlNotAllowed(String),

    /// Connection or protocol failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Non-success status code
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connect or read deadline passed
    #[error("request timed out")]
    Timeout,

    /// Body exceeded the configured size limit
    #[error("response exceeds size limit of {0} bytes")]
    TooLarge(usize),

    /// The body could not be interpreted
    #[error("invalid content: {0}")]
    InvalidContent(String),
}

impl RetrieveError {
    /// Error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UrlNotAllowed(_) => ErrorKind::Configuration,
            Self::InvalidContent(_) => ErrorKind::Structural,
            _ => ErrorKind::Network,
        }
    }
}

/// Fetches documents by URL
#[async_trait]
pub trait ResourceRetriever: Send + Sync + std::fmt::Debug {
    /// GET `url`
    async fn retrieve(&self, url: &Url) -> Result<Resource, RetrieveError>;
}

/// `reqwest`-backed retriever with timeouts and a size ceiling
#[derive(Debug, Clone)]
pub struct HttpResourceRetriever {
    client: reqwest::Client,
    config: RetrieverConfig,
}

impl HttpResourceRetriever {
    /// Retriever with default limits
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, RetrieveError> {
        Self::with_config(RetrieverConfig::default())
    }

    /// Retriever with custom limits
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::Http`] if the HTTP client cannot be built.
    pub fn with_config(config: RetrieverConfig) -> Result<Self, RetrieveError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RetrieveError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Active limits
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }
}

/// Whether `url` may be fetched: https, or http on a loopback host
pub(crate) fn is_allowed_url(url: &Url) -> bool {
    match url.scheme() {
        "https" => url.host().is_some(),
        "http" => match url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    }
}

#[async_trait]
impl ResourceRetriever for HttpResourceRetriever {
    async fn retrieve(&self, url: &Url) -> Result<Resource, RetrieveError> {
        if !is_allowed_url(url) {
            return Err(RetrieveError::UrlNotAllowed(url.to_string()));
        }

        let read_timeout = self.config.read_timeout();
        let head_deadline = self.config.connect_timeout() + read_timeout;
        let mut response = tokio::time::timeout(head_deadline, self.client.get(url.clone()).send())
            .await
            .map_err(|_| RetrieveError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    RetrieveError::Timeout
                } else {
                    RetrieveError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Resource endpoint returned error status");
            return Err(RetrieveError::Status(response.status().as_u16()));
        }

        let limit = self.config.size_limit;
        if let Some(content_length) = response.content_length()
            && content_length > limit as u64
        {
            return Err(RetrieveError::TooLarge(limit));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut content = Vec::new();
        while let Some(chunk) = tokio::time::timeout(read_timeout, response.chunk())
            .await
            .map_err(|_| RetrieveError::Timeout)?
            .map_err(|e| RetrieveError::Http(e.to_string()))?
        {
            if content.len() + chunk.len() > limit {
                return Err(RetrieveError::TooLarge(limit));
            }
            content.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = content.len(), "Retrieved resource");
        Ok(Resource {
            content,
            content_type,
        })
    }
}
