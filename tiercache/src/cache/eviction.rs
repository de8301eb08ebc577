//! Least-recently-used ordering and victim placement.
//!
//! Each tier keeps a [`RecencyIndex`]. Every access moves a key to the
//! most-recently-used end, so the least-recently-used end is always the key
//! with the oldest last access; keys that were never re-accessed keep their
//! insertion order. All operations are O(1).

use lru::LruCache;

/// Recency order over the keys resident in one tier.
pub struct RecencyIndex {
    order: LruCache<String, ()>,
}

impl RecencyIndex {
    /// Create an empty index. Capacity is enforced by the owning tier.
    pub fn new() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }

    /// Insert a key as most recently used, or move it there if present.
    pub fn record(&mut self, key: &str) {
        if self.order.contains(key) {
            self.order.promote(key);
        } else {
            self.order.push(key.to_string(), ());
        }
    }

    /// Move an existing key to the most-recently-used end.
    ///
    /// Returns `false` if the key is not tracked.
    pub fn touch(&mut self, key: &str) -> bool {
        if self.order.contains(key) {
            self.order.promote(key);
            true
        } else {
            false
        }
    }

    /// Stop tracking a key.
    pub fn remove(&mut self, key: &str) -> bool {
        self.order.pop(key).is_some()
    }

    /// The current victim (least recently used), without removing it.
    pub fn select_victim(&self) -> Option<&str> {
        self.order.peek_lru().map(|(key, _)| key.as_str())
    }

    /// Remove and return the least recently used key.
    pub fn take_victim(&mut self) -> Option<String> {
        self.order.pop_lru().map(|(key, _)| key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys_lru_first(&self) -> impl Iterator<Item = &str> {
        self.order.iter().rev().map(|(key, _)| key.as_str())
    }
}

impl Default for RecencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// What to do with a memory-tier victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Move the victim to the persistent tier
    Overflow,
    /// Delete the persistent tier's LRU element, then move the victim there
    EvictThenOverflow,
    /// No persistent tier: delete the victim
    Discard,
}

/// Decide where a memory-tier victim goes given persistent-tier occupancy.
pub fn plan_placement(disk_resident: usize, disk_capacity: usize) -> Placement {
    if disk_capacity == 0 {
        Placement::Discard
    } else if disk_resident < disk_capacity {
        Placement::Overflow
    } else {
        Placement::EvictThenOverflow
    }
}
