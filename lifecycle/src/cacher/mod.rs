//! Bounded key-value caches used to hold consensus items in memory.
//!
//! [Cacher] is the only interface the rest of the crate relies on: consumers never assume a
//! particular replacement policy, only that an inserted value may disappear at any time
//! (under capacity pressure) and that [Cacher::evict] and [Cacher::flush] remove values
//! immediately.
//!
//! Two implementations are provided:
//!
//! * [Lru]: evicts the least-recently used value once `capacity` is reached. A capacity of
//!   `0` disables the cache (every insertion is dropped).
//! * [Metered]: wraps any [Cacher] and counts hits and misses in a
//!   [prometheus_client::registry::Registry] without changing its behavior.

mod lru;
pub use self::lru::Lru;
mod metered;
pub use metered::Metered;

/// A fixed-capacity key-value store.
pub trait Cacher<K, V>: Send + 'static {
    /// Get the value stored at `key` (marking it as recently used).
    fn get(&mut self, key: &K) -> Option<&V>;

    /// Returns true if `key` is stored in the cache (without marking it as recently used).
    fn contains(&self, key: &K) -> bool;

    /// Store `value` at `key`, replacing any existing value.
    ///
    /// Inserting may evict other values.
    fn put(&mut self, key: K, value: V);

    /// Remove the value stored at `key` (if any).
    fn evict(&mut self, key: &K);

    /// Remove all values.
    fn flush(&mut self);

    /// Number of values currently stored.
    fn len(&self) -> usize;

    /// Returns true if no values are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
