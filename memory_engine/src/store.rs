//! Key-value storage seam.
//!
//! Components never hold hidden global state: each one owns a store it was handed, and the
//! caller decides what backs it (files, a document database, or the in-memory fake below).

use std::collections::HashMap;
use std::hash::Hash;

/// Minimal storage interface keyed by a composite key.
pub trait KeyValueStore<K, V> {
    fn get(&self, key: &K) -> Option<V>;

    fn put(&mut self, key: K, value: V);

    /// Remove an entry, returning it if it existed.
    fn delete(&mut self, key: &K) -> Option<V>;

    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

/// A `HashMap`-backed store.
#[derive(Debug, Clone)]
pub struct InMemoryStore<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<K: Eq + Hash, V: Clone> KeyValueStore<K, V> for InMemoryStore<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}
