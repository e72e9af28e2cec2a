//! In-process [`BlockCache`] implementation.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use super::BlockCache;

/// Longest lifetime a marker can be given.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `HashMap` of expiry instants behind a lock.
///
/// Expired entries read as absent; they are physically removed on the next
/// write to the same key or by [`BlockCache::purge_expired`]. Lifetimes are
/// capped at [`MAX_TTL`].
#[derive(Default)]
pub struct MemoryBlockCache {
    entries: RwLock<HashMap<String, Instant>>,
}

impl MemoryBlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockCache for MemoryBlockCache {
    fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|expires| *expires > Instant::now())
    }

    fn insert(&self, key: String, ttl: Duration) {
        let now = Instant::now();
        let expires = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, expires);
    }

    fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some_and(|expires| expires > Instant::now())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires| *expires > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Purged expired block cache entries");
        }
        purged
    }
}
