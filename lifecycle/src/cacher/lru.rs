use super::Cacher;
use std::{hash::Hash, num::NonZeroUsize};

/// A [Cacher] that evicts the least-recently used value when full.
///
/// A capacity of `0` disables the cache: [Cacher::put] drops the value and every lookup misses.
pub struct Lru<K: Hash + Eq, V> {
    inner: Option<::lru::LruCache<K, V>>,
}

impl<K: Hash + Eq, V> Lru<K, V> {
    /// Create a new cache holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(::lru::LruCache::new),
        }
    }

    /// Maximum number of values the cache can hold.
    pub fn capacity(&self) -> usize {
        self.inner.as_ref().map_or(0, |cache| cache.cap().get())
    }
}

impl<K, V> Cacher<K, V> for Lru<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.as_mut()?.get(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|cache| cache.contains(key))
    }

    fn put(&mut self, key: K, value: V) {
        if let Some(cache) = self.inner.as_mut() {
            cache.put(key, value);
        }
    }

    fn evict(&mut self, key: &K) {
        if let Some(cache) = self.inner.as_mut() {
            cache.pop(key);
        }
    }

    fn flush(&mut self) {
        if let Some(cache) = self.inner.as_mut() {
            cache.clear();
        }
    }

    fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |cache| cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut cache = Lru::new(2);
        assert_eq!(cache.capacity(), 2);
        cache.put(1u64, "one");
        cache.put(2u64, "two");

        // Touch 1 so that 2 becomes the least recently used
        assert_eq!(cache.get(&1), Some(&"one"));
        cache.put(3u64, "three");

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_contains_does_not_promote() {
        let mut cache = Lru::new(2);
        cache.put(1u64, ());
        cache.put(2u64, ());

        // Peeking at 1 must not save it from eviction
        assert!(cache.contains(&1));
        cache.put(3u64, ());
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_lru_evict_and_flush() {
        let mut cache = Lru::new(4);
        for i in 0..4u64 {
            cache.put(i, i * 10);
        }
        cache.evict(&2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.len(), 3);

        // Evicting a missing key is a no-op
        cache.evict(&42);
        assert_eq!(cache.len(), 3);

        cache.flush();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&0), None);
    }

    #[test]
    fn test_lru_zero_capacity_is_disabled() {
        let mut cache = Lru::new(0);
        assert_eq!(cache.capacity(), 0);
        cache.put(1u64, "one");
        assert_eq!(cache.get(&1), None);
        assert!(!cache.contains(&1));
        assert!(cache.is_empty());

        // Removal operations still succeed
        cache.evict(&1);
        cache.flush();
    }
}
