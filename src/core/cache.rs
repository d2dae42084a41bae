//! Bounded in-memory cache with per-entry TTL.
//!
//! Every provider key-space (fund database, ticker resolution, composition,
//! search, ...) gets its own instance with its own size cap and TTL, shared
//! via `Arc`. A miss covers both "never set" and "expired". Writers racing on
//! the same key are fine: results for one key are equivalent, last write wins.

use crate::core::clock::Clock;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

struct CacheInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    // Insertion order for eviction; may hold keys already removed from the
    // map, those are skipped when evicting.
    order: VecDeque<K>,
}

pub struct TtlCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries,
            clock,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        if let Some(entry) = cache.entries.get(key) {
            if let Some(expiry) = entry.expires_at {
                if expiry <= self.clock.now() {
                    debug!("Cache entry expired for key: {:?}", key);
                    return None;
                }
            }
            debug!("Cache HIT for key: {:?}", key);
            return Some(entry.value.clone());
        }
        debug!("Cache MISS for key: {:?}", key);
        None
    }

    /// Stores a value. `ttl: None` means the entry never expires. Inserting a
    /// new key at capacity first evicts the earliest-inserted surviving key.
    pub async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| self.clock.now() + duration);
        let mut cache = self.inner.lock().await;

        if cache.entries.contains_key(&key) {
            // Overwrite keeps the original insertion rank.
            cache.entries.insert(key, CacheEntry { value, expires_at });
            return;
        }

        if cache.entries.len() >= self.max_entries {
            while let Some(oldest) = cache.order.pop_front() {
                if cache.entries.remove(&oldest).is_some() {
                    debug!("Cache EVICT for key: {:?}", oldest);
                    break;
                }
            }
        }

        debug!("Cache PUT for key: {:?}", key);
        cache.order.push_back(key.clone());
        cache.entries.insert(key, CacheEntry { value, expires_at });
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
