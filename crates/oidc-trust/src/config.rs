//! Verification Configuration Types
//!
//! This module contains the serde-deserializable configuration structures for
//! the verification engine. All fields carry defaults so an empty document
//! yields a working configuration:
//!
//! ```rust
//! use oidc_trust::config::{ClaimsPolicy, RetrieverConfig};
//!
//! let policy: ClaimsPolicy = serde_json::from_str("{}").unwrap();
//! assert_eq!(policy.max_clock_skew_secs, 60);
//!
//! let retriever: RetrieverConfig =
//!     serde_json::from_str(r#"{ "size_limit": 8192 }"#).unwrap();
//! assert_eq!(retriever.size_limit, 8192);
//! assert_eq!(retriever.connect_timeout_ms, 500);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time-based claims policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPolicy {
    /// Tolerated clock drift between issuer and verifier, in seconds
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: u64,
}

/// Default clock skew: 60 seconds
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 60;

fn default_max_clock_skew() -> u64 {
    DEFAULT_MAX_CLOCK_SKEW_SECS
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        Self {
            max_clock_skew_secs: default_max_clock_skew(),
        }
    }
}

impl ClaimsPolicy {
    /// Policy with a custom clock skew
    pub fn with_clock_skew(skew: Duration) -> Self {
        Self {
            max_clock_skew_secs: skew.as_secs(),
        }
    }

    /// Clock skew as a [`Duration`]
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_secs)
    }
}

/// HTTP retrieval limits for remote JWK sets and sector identifier documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Connect timeout in milliseconds (default: 500)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds (default: 500)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Maximum response body size in bytes (default: 50 KiB)
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,

    /// User agent for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    500
}

fn default_read_timeout() -> u64 {
    500
}

fn default_size_limit() -> usize {
    50 * 1024
}

fn default_user_agent() -> String {
    format!("oidc-trust/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            size_limit: default_size_limit(),
            user_agent: default_user_agent(),
        }
    }
}

impl RetrieverConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Remote JWK set cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSetCacheConfig {
    /// How long a fetched JWK set is considered fresh, in seconds (default: 5 min)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Start a background refresh when the cached set is this close to going
    /// stale, in seconds (default: 30)
    #[serde(default = "default_refresh_ahead")]
    pub refresh_ahead_secs: u64,

    /// Minimum interval between two fetches, in milliseconds (default: 5 s)
    ///
    /// Bounds refetches triggered by unknown key IDs.
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_ms: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_refresh_ahead() -> u64 {
    30
}

fn default_min_refresh_interval() -> u64 {
    5_000
}

impl Default for JwkSetCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            refresh_ahead_secs: default_refresh_ahead(),
            min_refresh_interval_ms: default_min_refresh_interval(),
        }
    }
}

impl JwkSetCacheConfig {
    /// Cache time-to-live as a [`Duration`]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Refresh-ahead window as a [`Duration`], never longer than the TTL
    pub fn refresh_ahead(&self) -> Duration {
        Duration::from_secs(self.refresh_ahead_secs.min(self.ttl_secs))
    }

    /// Minimum interval between fetches as a [`Duration`]
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }
}
