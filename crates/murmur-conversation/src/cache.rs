// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded least-recently-used cache.
//!
//! Entries are kept in an insertion-ordered map where the front is the least
//! recently used and the back the most recently used. Touching an entry moves
//! it to the back; inserting into a full cache evicts the front. Eviction only
//! drops the cached copy, never the durable record.

use std::hash::Hash;

use indexmap::IndexMap;

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Fixed-capacity LRU cache.
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Hash + Eq, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Returns a copy of the entry and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.entries.get_index_of(key) {
            Some(index) => {
                self.hits += 1;
                let last = self.entries.len() - 1;
                self.entries.move_index(index, last);
                self.entries.get_index(last).map(|(_, v)| v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Returns a copy without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Inserts or replaces an entry as most recently used. Returns the evicted
    /// key when a different entry had to make room.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        if self.entries.shift_remove(&key).is_some() {
            self.entries.insert(key, value);
            return None;
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.evictions += 1;
            self.entries.shift_remove_index(0).map(|(k, _)| k)
        } else {
            None
        };
        self.entries.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            len: self.entries.len(),
            capacity: self.capacity,
        }
    }
}
