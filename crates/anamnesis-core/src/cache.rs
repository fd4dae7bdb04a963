// ABOUTME: Generic LRU/TTL cache with eviction callbacks and hit-rate statistics.
// ABOUTME: Grounded on codegraph-cache/src/cache.rs's CacheStats/CacheEntry shape.

use lru::LruCache;
use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_size: usize,
    /// Percentage in [0, 100], or `None` when no `get` has been issued yet.
    pub hit_rate: Option<f64>,
}

type EvictionHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// A synchronized LRU cache with an optional per-entry TTL.
pub struct Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Option<Duration>,
    max_size: usize,
    on_eviction: Option<EvictionHook<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(max_size: usize) -> Self {
        Self::builder(max_size).build()
    }

    pub fn builder(max_size: usize) -> CacheBuilder<K, V> {
        CacheBuilder {
            max_size,
            ttl: None,
            on_eviction: None,
        }
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut guard = self.inner.lock();
        let expired = guard
            .peek(key)
            .map(|e| self.is_expired(e))
            .unwrap_or(false);
        if expired {
            if let Some(entry) = guard.pop(key) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                if let Some(hook) = &self.on_eviction {
                    hook(key, &entry.value);
                }
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        match guard.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: K, value: V) {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        let mut guard = self.inner.lock();
        if let Some((evicted_key, evicted_entry)) = guard.push(key, entry) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            if let Some(hook) = &self.on_eviction {
                hook(&evicted_key, &evicted_entry.value);
            }
        }
    }

    pub fn has(&self, key: &K) -> bool {
        let guard = self.inner.lock();
        match guard.peek(key) {
            Some(entry) => !self.is_expired(entry),
            None => false,
        }
    }

    pub fn delete(&self, key: &K) -> bool {
        let mut guard = self.inner.lock();
        guard.pop(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Evict all entries past their TTL, returning the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut guard = self.inner.lock();
        let expired_keys: Vec<K> = guard
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(k, _)| k.clone())
            .collect();
        let removed = expired_keys.len();
        for key in expired_keys {
            if let Some(entry) = guard.pop(&key) {
                if let Some(hook) = &self.on_eviction {
                    hook(&key, &entry.value);
                }
            }
        }
        drop(guard);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn get_stats(&self) -> CacheStats {
        let size = self.inner.lock().len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            max_size: self.max_size,
            hit_rate: if total == 0 {
                None
            } else {
                Some(100.0 * hits as f64 / total as f64)
            },
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Atomically get-or-compute a value for `key`, running `factory` at most once
    /// per miss. Uses a coarse per-cache lock rather than per-key striping, which is
    /// adequate at the cache sizes this engine deals with (concept/embedding lookups).
    pub fn get_or_compute<F>(&self, key: K, factory: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = factory();
        self.set(key, value.clone());
        value
    }

    /// Async variant of `get_or_compute`, for factories that must await (e.g. an
    /// embedding model call).
    pub async fn get_or_compute_async<F, Fut>(&self, key: K, factory: F) -> V
    where
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = factory().await;
        self.set(key, value.clone());
        value
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

pub struct CacheBuilder<K, V>
where
    K: Eq + Hash + Clone,
{
    max_size: usize,
    ttl: Option<Duration>,
    on_eviction: Option<EvictionHook<K, V>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn on_eviction<F>(mut self, hook: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_eviction = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Cache<K, V> {
        let capacity = NonZeroUsize::new(self.max_size.max(1)).unwrap();
        Cache {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl: self.ttl,
            max_size: self.max_size,
            on_eviction: self.on_eviction,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_none_with_no_requests() {
        let cache: Cache<String, u32> = Cache::new(10);
        assert_eq!(cache.get_stats().hit_rate, None);
    }

    #[test]
    fn sets_then_gets_all_keys_yields_full_hit_rate() {
        let cache: Cache<String, u32> = Cache::new(10);
        for i in 0..5 {
            cache.set(format!("k{i}"), i);
        }
        for i in 0..5 {
            assert_eq!(cache.get(&format!("k{i}")), Some(i));
        }
        let stats = cache.get_stats();
        assert_eq!(stats.hits, 5);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, Some(100.0));
    }

    #[test]
    fn eviction_beyond_capacity_triggers_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering as O};
        use std::sync::Arc;

        let evicted = Arc::new(AtomicUsize::new(0));
        let evicted_clone = evicted.clone();
        let cache: Cache<i32, i32> = Cache::builder(2)
            .on_eviction(move |_, _| {
                evicted_clone.fetch_add(1, O::Relaxed);
            })
            .build();

        cache.set(1, 1);
        cache.set(2, 2);
        cache.set(3, 3); // evicts key 1 (LRU)

        assert_eq!(evicted.load(O::Relaxed), 1);
        assert_eq!(cache.get_stats().evictions, 1);
        assert!(!cache.has(&1));
    }

    #[test]
    fn ttl_expiry_counts_as_eviction_on_access() {
        let cache: Cache<&str, i32> = Cache::builder(10).ttl(Duration::from_millis(1)).build();
        cache.set("k", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"k"), None);
        assert_eq!(cache.get_stats().evictions, 1);
    }

    #[test]
    fn get_or_compute_runs_factory_once_per_miss() {
        use std::sync::atomic::{AtomicUsize, Ordering as O};
        let calls = AtomicUsize::new(0);
        let cache: Cache<&str, i32> = Cache::new(10);

        let v1 = cache.get_or_compute("k", || {
            calls.fetch_add(1, O::Relaxed);
            42
        });
        let v2 = cache.get_or_compute("k", || {
            calls.fetch_add(1, O::Relaxed);
            99
        });

        assert_eq!(v1, 42);
        assert_eq!(v2, 42);
        assert_eq!(calls.load(O::Relaxed), 1);
    }
}
