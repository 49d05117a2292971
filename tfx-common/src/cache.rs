//! Generic key -> value store with optional per-entry TTL.
//!
//! Backs the credential chain's IAM-session cache and the partial parser's memoised results.
//! Built on `mini-moka`, the same cache crate the engine already depends on, with a custom
//! [`Expiry`] policy so each entry can carry its own time-to-live instead of one cache-wide TTL.
//!

use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use mini_moka::sync::{Cache, CacheBuilder};
use mini_moka::Expiry;

/// Wraps a stored value together with the TTL it was inserted with.
///
#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    ttl: Option<Duration>,
}

struct PerEntryExpiry;

impl<K, V> Expiry<K, Entry<V>> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &K, value: &Entry<V>, _now: Instant) -> Option<Duration> {
        value.ttl
    }
}

/// Expiring cache: entries without a TTL never expire on their own; entries with a TTL are
/// evicted lazily on the next `get`/`contains_key` that observes them past expiration.
///
pub struct ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, Entry<V>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// New cache with no capacity bound (the caller controls the key set, per spec).
    ///
    pub fn new() -> Self {
        let inner = CacheBuilder::new(u64::MAX)
            .expire_after(PerEntryExpiry)
            .build();
        ExpiringCache { inner }
    }

    /// Insert a value with no expiration.
    ///
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, Entry { value, ttl: None });
    }

    /// Insert a value that expires `ttl` from now.
    ///
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.inner.insert(
            key,
            Entry {
                value,
                ttl: Some(ttl),
            },
        );
    }

    /// Fetch a value, evicting it first if its TTL has elapsed.
    ///
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|e| e.value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }
}

impl<K, V> Default for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn insert_and_get_roundtrip() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new();
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn missing_key_is_none() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new();
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn ttl_entry_expires() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new();
        cache.insert_with_ttl("a".to_string(), 1, Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        sleep(Duration::from_millis(80));
        cache.inner.run_pending_tasks();
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn no_ttl_entry_survives() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new();
        cache.insert("a".to_string(), 1);
        sleep(Duration::from_millis(50));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }
}
