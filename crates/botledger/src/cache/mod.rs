//! Fast-path cache of "this address is blocked" markers.
//!
//! Upstream request handling consults the cache before the store. Any write
//! that clears a block must also drop the marker, otherwise the address
//! stays short-circuited until the entry expires.

mod memory;

use std::net::IpAddr;
use std::time::Duration;

use sha2::{Digest, Sha256};

pub use memory::{MAX_TTL, MemoryBlockCache};

/// Key-value store with per-entry expiry, holding blocked markers.
pub trait BlockCache: Send + Sync {
    /// Whether an unexpired marker exists for `key`.
    fn contains(&self, key: &str) -> bool;

    /// Insert or refresh a marker that expires after `ttl`.
    fn insert(&self, key: String, ttl: Duration);

    /// Drop a marker. Returns `true` if one was present.
    fn remove(&self, key: &str) -> bool;

    /// Drop every expired marker, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Stable cache key for an address: `bot_blocked_<hex sha256>`.
///
/// Callers must pass the parsed address so that equivalent spellings hash
/// identically.
pub fn block_cache_key(ip: &IpAddr) -> String {
    let digest = Sha256::digest(ip.to_string().as_bytes());
    format!("bot_blocked_{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use botledger_core::parse_ip;

    #[test]
    fn key_is_stable_across_spellings() {
        let a = block_cache_key(&parse_ip("::ffff:10.0.0.5").unwrap());
        let b = block_cache_key(&parse_ip("10.0.0.5").unwrap());
        assert_eq!(a, b);
        assert!(a.starts_with("bot_blocked_"));
        assert_eq!(a.len(), "bot_blocked_".len() + 64);
    }

    #[test]
    fn distinct_addresses_get_distinct_keys() {
        let a = block_cache_key(&parse_ip("10.0.0.5").unwrap());
        let b = block_cache_key(&parse_ip("10.0.0.6").unwrap());
        assert_ne!(a, b);
    }
}
