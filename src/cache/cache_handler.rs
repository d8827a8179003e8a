//! The cache capability and its in-memory backend.
//!
//! Cache access is best-effort: backends report failures as [`CacheError`],
//! and [`read_through`] / [`write_through`] log those failures and carry on
//! as if the key were missing. A cache outage therefore degrades to
//! recomputation and never fails a request.
//!
//! Keys are content keys built by [`cache_key`] from a namespace and a
//! position identity, so concurrent writers of one key always write equal
//! values and last-write-wins is harmless.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::utilities::errors::CacheError;

/// A key/value store shared by concurrent requests.
///
/// Each `set` must be all-or-nothing for its key: a reader sees either the
/// previous value or the new one, never a partial write.
#[async_trait]
pub trait CacheLayer: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;
}

/// Build a content key: `"{namespace}-{sha256(identity)}"`.
pub fn cache_key(namespace: &str, identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("{}-{}", namespace, hex::encode(digest))
}

/// Typed lookup. Backend errors and undecodable values are logged and
/// reported as a miss.
pub async fn read_through<T: DeserializeOwned>(cache: &dyn CacheLayer, key: &str) -> Option<T> {
    let value = match cache.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Cache read failed for {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            log::warn!("Discarding undecodable cache entry {}: {}", key, e);
            None
        }
    }
}

/// Typed store. Failures are logged and swallowed.
pub async fn write_through<T: Serialize>(
    cache: &dyn CacheLayer,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) {
    let encoded = match serde_json::to_value(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            log::warn!("Cache value for {} could not be encoded: {}", key, e);
            return;
        }
    };
    if let Err(e) = cache.set(key, encoded, ttl).await {
        log::warn!("Cache write failed for {}: {}", key, e);
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Writes between sweeps of expired entries.
const PURGE_INTERVAL: usize = 64;

/// Thread-safe in-memory cache with optional per-entry TTL.
///
/// Expired entries are dropped when read and swept every
/// [`PURGE_INTERVAL`] writes. Entries without a TTL live as long as the
/// cache, so its size is bounded only by the distinct keys written.
/// Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheLayer for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        if self.writes.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            let removed = self.purge_expired();
            if removed > 0 {
                log::debug!("Purged {} expired cache entries", removed);
            }
        }
        Ok(())
    }
}

/// A cache that stores nothing. Every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheLayer for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }
}
