use super::Cacher;
use prometheus_client::{metrics::counter::Counter, registry::Registry};

/// A wrapper around a [Cacher] implementation that counts hits and misses.
pub struct Metered<C> {
    inner: C,
    hits: Counter,
    misses: Counter,
}

impl<C> Metered<C> {
    /// Wrap `inner` and register its metrics in the provided registry.
    pub fn new(inner: C, registry: &mut Registry) -> Self {
        let hits = Counter::default();
        registry.register("hits", "Number of lookups that found a value", hits.clone());
        let misses = Counter::default();
        registry.register(
            "misses",
            "Number of lookups that did not find a value",
            misses.clone(),
        );
        Self {
            inner,
            hits,
            misses,
        }
    }

    /// Number of lookups that found a value.
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Number of lookups that did not find a value.
    pub fn misses(&self) -> u64 {
        self.misses.get()
    }
}

impl<K, V, C: Cacher<K, V>> Cacher<K, V> for Metered<C> {
    fn get(&mut self, key: &K) -> Option<&V> {
        let value = self.inner.get(key);
        if value.is_some() {
            self.hits.inc();
        } else {
            self.misses.inc();
        }
        value
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    fn put(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    fn evict(&mut self, key: &K) {
        self.inner.evict(key);
    }

    fn flush(&mut self) {
        self.inner.flush();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cacher::Lru;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_metered_counts_lookups() {
        let mut registry = Registry::default();
        let mut cache = Metered::new(Lru::new(2), &mut registry);

        cache.put(1u64, "one");
        assert_eq!(cache.get(&1), Some(&"one"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(&"one"));
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);

        // Peeking is not a lookup
        assert!(cache.contains(&1));
        assert_eq!(cache.hits(), 2);

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("hits_total 2"));
        assert!(buffer.contains("misses_total 1"));
    }

    #[test]
    fn test_metered_does_not_alter_behavior() {
        let mut registry = Registry::default();
        let mut metered = Metered::new(Lru::new(2), &mut registry);
        let mut plain = Lru::new(2);

        for key in [1u64, 2, 1, 3, 4, 1] {
            metered.put(key, key);
            plain.put(key, key);
        }
        metered.evict(&4);
        plain.evict(&4);

        for key in 0..5u64 {
            assert_eq!(metered.contains(&key), plain.contains(&key));
        }
        assert_eq!(metered.len(), plain.len());

        metered.flush();
        assert!(metered.is_empty());
    }
}
