//! Bounded least-recently-used map
//!
//! Backs both the requirement session store and the advisor response cache.
//! Callers wrap it in a mutex; it does no locking of its own.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    /// Front is least recently used
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// A zero capacity cache stores nothing
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let value = self.entries.get(key)?.clone();
        self.touch(key);
        Some(value)
    }

    /// Insert or replace, returning the evicted key if any
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return None;
        }
        self.order.push_back(key);
        if self.entries.len() > self.capacity {
            let evicted = self.order.pop_front()?;
            self.entries.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.put("c", 3), Some("b"));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_replace_does_not_grow() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = LruCache::new(0);
        cache.put("a", 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut cache = LruCache::new(4);
        cache.put(1, "x");
        cache.put(2, "y");
        assert_eq!(cache.remove(&1), Some("x"));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.len(), 1);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            capacity in 0usize..8,
            ops in prop::collection::vec((0u8..16, any::<bool>()), 0..64),
        ) {
            let mut cache = LruCache::new(capacity);
            for (key, is_put) in ops {
                if is_put {
                    cache.put(key, key);
                } else {
                    let _ = cache.get(&key);
                }
                prop_assert!(cache.len() <= capacity);
                prop_assert_eq!(cache.order.len(), cache.entries.len());
            }
        }
    }
}
