//! Bounded LRU cache used by the model and result caches.

use std::collections::HashMap;
use std::hash::Hash;

/// A bounded least-recently-used cache.
///
/// `get` marks the entry most-recently-used; `put` inserts or refreshes
/// recency without duplicating storage, evicting exactly the least-recently-
/// used entry when capacity is exceeded. A capacity of 0 disables storage
/// entirely (every `get` misses, every `put` is a no-op).
#[derive(Debug)]
pub struct LruCache<K, V> {
    map: HashMap<K, V>,
    /// Recency order, least-recently-used first.
    order: Vec<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether the cache holds `key` (without touching recency).
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Look up `key`, marking it most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.map.contains_key(key) {
            self.touch(key);
            self.map.get(key)
        } else {
            None
        }
    }

    /// Mutable lookup, marking the entry most-recently-used on a hit.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.map.contains_key(key) {
            self.touch(key);
            self.map.get_mut(key)
        } else {
            None
        }
    }

    /// Insert or replace `key`, marking it most-recently-used. Returns the
    /// evicted entry, if the insertion pushed the cache over capacity.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return None;
        }

        if self.map.contains_key(&key) {
            self.map.insert(key.clone(), value);
            self.touch(&key);
            return None;
        }

        self.map.insert(key.clone(), value);
        self.order.push(key);

        if self.map.len() > self.capacity {
            let oldest = self.order.remove(0);
            let value = self.map.remove(&oldest)?;
            return Some((oldest, value));
        }
        None
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }
}
