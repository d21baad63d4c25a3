//! Time-bounded response cache.
//!
//! # Responsibilities
//! - Hold successful upstream responses for a fixed TTL
//! - Serve them without touching the upstream or its circuit
//! - Stay within a bounded number of entries
//!
//! # Design Decisions
//! - Only successful values are ever stored; failures always reach the loader again
//! - A TTL of zero disables storage entirely
//! - Concurrent misses on one key may all load; the last writer wins
//! - At capacity, expired entries are purged first, then the entry closest to expiry goes

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Whether a value came from the cache or the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A concurrent TTL cache shared by clones.
#[derive(Debug, Clone)]
pub struct ResponseCache<K, V>
where
    K: Eq + Hash,
{
    namespace: &'static str,
    ttl: Duration,
    max_entries: usize,
    entries: Arc<DashMap<K, CacheEntry<V>>>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(namespace: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            namespace,
            ttl,
            max_entries,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn from_config(namespace: &'static str, config: &CacheConfig) -> Self {
        Self::new(namespace, config.ttl(), config.max_entries)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.max_entries > 0
    }

    /// Fetch a live entry. Expired entries are removed on sight.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }

        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());

        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }

        metrics::record_cache_lookup(self.namespace, hit.is_some());
        hit
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.make_room();
        }

        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key, entry);
    }

    /// Return the cached value for `key`, or run `loader` and cache its success.
    pub async fn get_or_load<F, Fut, E>(&self, key: &K, loader: F) -> Result<(V, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok((value, CacheStatus::Hit));
        }

        let value = loader().await?;
        self.insert(key.clone(), value.clone());
        Ok((value, CacheStatus::Miss))
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    fn make_room(&self) {
        let purged = self.purge_expired();
        if purged > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            tracing::debug!(namespace = self.namespace, "Evicted cache entry at capacity");
        }
    }
}
