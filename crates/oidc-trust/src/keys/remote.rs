//! Remote JWK set with caching
//!
//! [`RemoteJwkSet`] fetches a JWK set document over HTTPS through a
//! [`ResourceRetriever`] and keeps it in a single atomically swapped cache
//! cell:
//!
//! - **Single-flight refresh**: concurrent callers that find the cache stale
//!   wait on one fetch instead of issuing their own
//! - **Refresh-ahead**: shortly before the TTL runs out a background task
//!   refreshes the set while callers keep using the current one
//! - **Last-good fallback**: a failed fetch never replaces a good set
//! - **Key rotation**: a `kid` that is not in the cached set triggers one
//!   rate-limited refresh
//!
//! Readers always see a complete previous or complete new set, never a
//! partially written one. A stale or missing set can make verification fail;
//! it can never make it succeed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::matcher::JwkMatcher;
use super::source::{JwkSetSource, KeySourceError, parse_jwk_set};
use crate::config::JwkSetCacheConfig;
use crate::retrieval::{HttpResourceRetriever, ResourceRetriever, RetrieveError};

/// Observable state of the cache cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Nothing fetched and nothing attempted yet
    NotYetAvailable,
    /// Holding a set younger than the TTL
    Fresh,
    /// Holding a set older than the TTL
    Stale,
    /// The latest fetch failed; a previous good set, if any, is still served
    FetchFailed,
}

#[derive(Debug, Default)]
struct CacheCell {
    jwks: Option<Arc<JwkSet>>,
    fetched_at: Option<Instant>,
    last_attempt: Option<Instant>,
    last_error: Option<KeySourceError>,
    generation: u64,
}

impl CacheCell {
    fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }
}

#[derive(Debug)]
struct Inner {
    url: Url,
    retriever: Arc<dyn ResourceRetriever>,
    config: JwkSetCacheConfig,
    cell: ArcSwap<CacheCell>,
    refresh_lock: Mutex<()>,
    background_refresh: AtomicBool,
}

/// JWK set fetched from a URL and cached
///
/// Cloning is cheap; clones share the cache.
///
/// # Example
///
/// ```rust,no_run
/// # use oidc_trust::keys::{JwkMatcher, JwkSetSource, RemoteJwkSet};
/// # tokio_test::block_on(async {
/// let url = url::Url::parse("https://c2id.com/jwks.json")?;
/// let jwks = RemoteJwkSet::new(url)?;
///
/// let keys = jwks.get(&JwkMatcher::any().key_id("1")).await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct RemoteJwkSet {
    inner: Arc<Inner>,
}

impl RemoteJwkSet {
    /// Remote set with the default HTTP retriever and cache settings
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError`] if the HTTP client cannot be built.
    pub fn new(url: Url) -> Result<Self, RetrieveError> {
        Ok(Self::with_retriever(
            url,
            Arc::new(HttpResourceRetriever::new()?),
            JwkSetCacheConfig::default(),
        ))
    }

    /// Remote set with a custom retriever and cache settings
    pub fn with_retriever(
        url: Url,
        retriever: Arc<dyn ResourceRetriever>,
        config: JwkSetCacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url,
                retriever,
                config,
                cell: ArcSwap::from_pointee(CacheCell::default()),
                refresh_lock: Mutex::new(()),
                background_refresh: AtomicBool::new(false),
            }),
        }
    }

    /// JWK set URL
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Current cache state
    pub fn status(&self) -> CacheStatus {
        let cell = self.inner.cell.load();
        if cell.last_error.is_some() {
            return CacheStatus::FetchFailed;
        }
        match cell.age() {
            None => CacheStatus::NotYetAvailable,
            Some(age) if age < self.inner.config.ttl() => CacheStatus::Fresh,
            Some(_) => CacheStatus::Stale,
        }
    }

    /// The cached set, if one has been fetched
    pub fn cached(&self) -> Option<Arc<JwkSet>> {
        self.inner.cell.load().jwks.clone()
    }

    /// Start fetching in the background so the first verification does not
    /// wait for the network
    ///
    /// Returns `None` when called outside a Tokio runtime; the first lookup
    /// then fetches in the foreground.
    pub fn warm_up(&self) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            debug!(url = %self.inner.url, "No Tokio runtime, skipping JWK set warm-up");
            return None;
        };
        let inner = Arc::clone(&self.inner);
        Some(handle.spawn(async move {
            let generation = inner.cell.load().generation;
            Inner::refresh(&inner, generation).await;
        }))
    }

    /// Fetch now unless another fetch happened within the minimum interval
    pub async fn refresh(&self) -> CacheStatus {
        let generation = self.inner.cell.load().generation;
        Inner::refresh(&self.inner, generation).await;
        self.status()
    }

    fn spawn_background_refresh(&self) {
        if self
            .inner
            .background_refresh
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            // Still fresh; the next lookup after the TTL refreshes in the foreground
            debug!(url = %self.inner.url, "No Tokio runtime, skipping background refresh");
            self.inner.background_refresh.store(false, Ordering::Release);
            return;
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            let generation = inner.cell.load().generation;
            Inner::refresh(&inner, generation).await;
            inner.background_refresh.store(false, Ordering::Release);
        });
    }

    /// The set to serve, refreshing in the foreground when nothing fresh is cached
    async fn current(&self) -> Result<Arc<JwkSet>, KeySourceError> {
        let ttl = self.inner.config.ttl();
        let cell = self.inner.cell.load_full();

        match (&cell.jwks, cell.age()) {
            (Some(jwks), Some(age)) if age < ttl => {
                if age + self.inner.config.refresh_ahead() >= ttl {
                    debug!(url = %self.inner.url, "JWK set close to expiry, refreshing in background");
                    self.spawn_background_refresh();
                }
                Ok(Arc::clone(jwks))
            }
            _ => {
                let cell = Inner::refresh(&self.inner, cell.generation).await;
                match (&cell.jwks, &cell.last_error) {
                    (Some(jwks), _) => Ok(Arc::clone(jwks)),
                    (None, Some(e)) => Err(e.clone()),
                    (None, None) => Err(KeySourceError::Unavailable),
                }
            }
        }
    }
}

impl Inner {
    /// Single-flight refresh
    ///
    /// `observed` is the generation the caller saw; if the cell moved on while
    /// waiting for the lock, the newer cell is returned without fetching.
    async fn refresh(inner: &Arc<Inner>, observed: u64) -> Arc<CacheCell> {
        let _guard = inner.refresh_lock.lock().await;

        let current = inner.cell.load_full();
        if current.generation != observed {
            return current;
        }
        if let Some(last) = current.last_attempt
            && last.elapsed() < inner.config.min_refresh_interval()
        {
            warn!(
                url = %inner.url,
                since_last_ms = last.elapsed().as_millis(),
                "JWK set refresh rate limited, using cache"
            );
            return current;
        }

        info!(url = %inner.url, "Fetching JWK set");
        let now = Instant::now();
        let fetched = match inner.retriever.retrieve(&inner.url).await {
            Ok(resource) => parse_jwk_set(&resource.content),
            Err(e) => Err(KeySourceError::from(e)),
        };

        let next = match fetched {
            Ok(jwks) => {
                info!(url = %inner.url, key_count = jwks.keys.len(), "Fetched JWK set");
                CacheCell {
                    jwks: Some(Arc::new(jwks)),
                    fetched_at: Some(now),
                    last_attempt: Some(now),
                    last_error: None,
                    generation: current.generation + 1,
                }
            }
            Err(e) => {
                warn!(
                    url = %inner.url,
                    error = %e,
                    has_last_good = current.jwks.is_some(),
                    "JWK set fetch failed"
                );
                CacheCell {
                    jwks: current.jwks.clone(),
                    fetched_at: current.fetched_at,
                    last_attempt: Some(now),
                    last_error: Some(e),
                    generation: current.generation + 1,
                }
            }
        };

        let next = Arc::new(next);
        inner.cell.store(Arc::clone(&next));
        next
    }
}

#[async_trait]
impl JwkSetSource for RemoteJwkSet {
    async fn get(&self, matcher: &JwkMatcher) -> Result<Vec<Jwk>, KeySourceError> {
        let jwks = self.current().await?;
        let matched = matcher.filter(&jwks.keys);
        if !matched.is_empty() {
            return Ok(matched);
        }

        // Unknown kid: the issuer may have rotated its keys
        let Some(kid) = matcher.required_key_id() else {
            return Ok(matched);
        };
        debug!(url = %self.inner.url, kid, "No cached key matches kid, refreshing");
        let observed = self.inner.cell.load().generation;
        let cell = Inner::refresh(&self.inner, observed).await;
        Ok(cell
            .jwks
            .as_ref()
            .map(|jwks| matcher.filter(&jwks.keys))
            .unwrap_or_default())
    }
}
