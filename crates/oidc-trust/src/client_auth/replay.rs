//! Replay protection for client assertions
//!
//! A `jti` may be expended once per client until the assertion expires.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::identifier::{ClientId, JwtId};

/// Entries kept before expired ones are swept
const CLEANUP_THRESHOLD: usize = 10_000;

/// Minimum seconds between sweeps
const CLEANUP_INTERVAL_SECS: i64 = 60;

/// Records expended JWT IDs
pub trait ExpendedJtiChecker: Send + Sync + std::fmt::Debug {
    /// Mark `jti` from `client_id` as expended until `expires_at`
    ///
    /// Returns `false` if it was already expended and has not expired.
    fn try_expend(&self, jti: &JwtId, client_id: &ClientId, expires_at: i64, now: i64) -> bool;
}

/// In-process [`ExpendedJtiChecker`]
///
/// Entries are swept lazily once the map grows past a threshold, so memory is
/// bounded by the number of assertions live within their expiration window.
#[derive(Debug, Default)]
pub struct InMemoryJtiCache {
    entries: DashMap<(ClientId, JwtId), i64>,
    last_cleanup: AtomicI64,
}

impl InMemoryJtiCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked entries, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries expired at `now`
    pub fn cleanup(&self, now: i64) {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        self.last_cleanup.store(now, Ordering::Relaxed);
        debug!(
            removed = before.saturating_sub(self.entries.len()),
            remaining = self.entries.len(),
            "JTI cache swept"
        );
    }

    fn maybe_cleanup(&self, now: i64) {
        if self.entries.len() < CLEANUP_THRESHOLD {
            return;
        }
        if now - self.last_cleanup.load(Ordering::Relaxed) >= CLEANUP_INTERVAL_SECS {
            self.cleanup(now);
        }
    }
}

impl ExpendedJtiChecker for InMemoryJtiCache {
    fn try_expend(&self, jti: &JwtId, client_id: &ClientId, expires_at: i64, now: i64) -> bool {
        self.maybe_cleanup(now);

        match self.entries.entry((client_id.clone(), jti.clone())) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    warn!(client_id = %client_id, jti = %jti, "Client assertion replay detected");
                    return false;
                }
                entry.insert(expires_at);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }
}
