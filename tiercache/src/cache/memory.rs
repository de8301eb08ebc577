//! In-memory tier with LRU ordering.

use crate::cache::element::Element;
use crate::cache::eviction::RecencyIndex;
use std::collections::HashMap;
use std::time::SystemTime;

/// Memory-resident elements of one store.
///
/// Capacity is a maximum element count. The tier itself never evicts; the
/// owning store drains it with [`MemoryTier::take_victim`] while
/// [`MemoryTier::is_over_capacity`] holds, deciding where each victim goes.
pub struct MemoryTier {
    /// Resident elements
    elements: HashMap<String, Element>,
    /// Access order for victim selection
    recency: RecencyIndex,
    /// Maximum resident elements
    capacity: usize,
}

impl MemoryTier {
    /// Create an empty tier holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            elements: HashMap::new(),
            recency: RecencyIndex::new(),
            capacity,
        }
    }

    /// Look up an element without touching it.
    pub fn get(&self, key: &str) -> Option<&Element> {
        self.elements.get(key)
    }

    /// Insert or replace an element as most recently used.
    ///
    /// Returns the replaced element, if any.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        self.recency.record(element.key());
        self.elements.insert(element.key().to_string(), element)
    }

    /// Record a read: refresh last access and move to most recently used.
    pub fn touch(&mut self, key: &str, now: SystemTime) -> Option<&Element> {
        let element = self.elements.get_mut(key)?;
        element.touch(now);
        self.recency.touch(key);
        Some(element)
    }

    pub fn remove(&mut self, key: &str) -> Option<Element> {
        let element = self.elements.remove(key)?;
        self.recency.remove(key);
        Some(element)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.elements.contains_key(key)
    }

    /// Whether more elements are resident than the capacity allows.
    pub fn is_over_capacity(&self) -> bool {
        self.elements.len() > self.capacity
    }

    /// Remove and return the least recently used element.
    pub fn take_victim(&mut self) -> Option<Element> {
        let key = self.recency.take_victim()?;
        self.elements.remove(&key)
    }

    /// Keys of elements that are dead at `now`.
    pub fn expired_keys(&self, now: SystemTime) -> Vec<String> {
        self.elements
            .values()
            .filter(|element| element.is_expired(now))
            .map(|element| element.key().to_string())
            .collect()
    }

    /// Number of resident elements that are live at `now`.
    pub fn live_count(&self, now: SystemTime) -> usize {
        self.elements
            .values()
            .filter(|element| !element.is_expired(now))
            .count()
    }

    /// Resident keys from least to most recently used.
    pub fn keys_lru_first(&self) -> Vec<String> {
        self.recency.keys_lru_first().map(str::to_string).collect()
    }

    /// Remove every element, least recently used first.
    pub fn drain_lru_first(&mut self) -> Vec<Element> {
        let mut drained = Vec::with_capacity(self.elements.len());
        while let Some(element) = self.take_victim() {
            drained.push(element);
        }
        drained
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
