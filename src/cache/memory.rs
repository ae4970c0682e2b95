//! Bounded in-process cache tier.
//!
//! Holds at most `capacity` entries. When an insert overflows the bound the
//! earliest-inserted key is dropped (FIFO); reads never reorder entries.

use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default number of entries kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// Fixed-capacity, insertion-ordered cache.
#[derive(Debug)]
pub struct MemoryCache<K, V> {
    /// Cached entries (key -> value)
    entries: HashMap<K, V>,
    /// Insertion order (front = oldest, back = newest)
    order: VecDeque<K>,
    /// Maximum number of entries
    capacity: usize,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Get a value without affecting eviction order.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Insert or replace a value.
    ///
    /// Replacing keeps the key's original insertion position. Returns the key
    /// evicted to make room, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<K> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        self.entries.insert(key.clone(), value);
        self.order.push_back(key);

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                return Some(oldest);
            }
        }
        None
    }

    /// Remove a key, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| <K as Borrow<Q>>::borrow(k) != key);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
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
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}
