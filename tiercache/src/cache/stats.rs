//! Cache statistics tracking and reporting.
//!
//! Counters are updated with relaxed atomics so recording never contends with
//! the store lock. Snapshots combine the counters with the element counts the
//! store reports at snapshot time.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::types::Location;

/// Per-cache counters, fed passively by the element store.
#[derive(Debug)]
pub struct StatisticsCollector {
    hits_in_memory: AtomicU64,
    hits_on_disk: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// Cumulative get latency in nanoseconds
    get_time_nanos: AtomicU64,
    /// Number of timed gets
    gets: AtomicU64,
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsCollector {
    /// Create a collector with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits_in_memory: AtomicU64::new(0),
            hits_on_disk: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            get_time_nanos: AtomicU64::new(0),
            gets: AtomicU64::new(0),
        }
    }

    /// Record a hit on an element resident in `location`.
    pub fn record_hit(&self, location: Location) {
        match location {
            Location::Memory => self.hits_in_memory.fetch_add(1, Ordering::Relaxed),
            Location::Disk => self.hits_on_disk.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a get that found no live element.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record evicted victims (overflowed or deleted), once per victim.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record the latency of one get.
    pub fn record_get_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.get_time_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits_in_memory.load(Ordering::Relaxed) + self.hits_on_disk.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Average get latency in milliseconds, 0 before the first get.
    pub fn average_get_time_ms(&self) -> f64 {
        let gets = self.gets.load(Ordering::Relaxed);
        if gets == 0 {
            return 0.0;
        }
        let nanos = self.get_time_nanos.load(Ordering::Relaxed);
        nanos as f64 / gets as f64 / 1_000_000.0
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits_in_memory,
            &self.hits_on_disk,
            &self.misses,
            &self.evictions,
            &self.get_time_nanos,
            &self.gets,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Build a snapshot using the store's current live element counts.
    pub fn snapshot(&self, elements_in_memory: usize, elements_on_disk: usize) -> CacheStatistics {
        let hits_in_memory = self.hits_in_memory.load(Ordering::Relaxed);
        let hits_on_disk = self.hits_on_disk.load(Ordering::Relaxed);
        let hits = hits_in_memory + hits_on_disk;
        let misses = self.misses();

        CacheStatistics {
            average_get_time: self.average_get_time_ms(),
            hits,
            misses,
            hit_rate: hit_rate_percent(hits, misses),
            evictions: self.evictions(),
            hits_in_memory,
            hits_on_disk,
            elements: (elements_in_memory + elements_on_disk) as u64,
            elements_on_disk: elements_on_disk as u64,
            elements_in_memory: elements_in_memory as u64,
        }
    }
}

/// `round(100 * (1 - misses / (hits + misses)))`, 0 when nothing was requested.
pub fn hit_rate_percent(hits: u64, misses: u64) -> u64 {
    let total = hits + misses;
    if total == 0 {
        return 0;
    }
    (100.0 * (1.0 - misses as f64 / total as f64)).round() as u64
}

/// Snapshot of one cache's statistics.
///
/// Serializes with the camelCase field names consumers of the statistics
/// object depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    /// Mean get latency in milliseconds
    pub average_get_time: f64,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of gets that found a live element, rounded
    pub hit_rate: u64,
    pub evictions: u64,
    pub hits_in_memory: u64,
    pub hits_on_disk: u64,
    /// Live elements across both tiers
    pub elements: u64,
    pub elements_on_disk: u64,
    pub elements_in_memory: u64,
}

impl CacheStatistics {
    /// Compatibility JSON of the snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "averageGetTime": self.average_get_time,
            "hits": self.hits,
            "misses": self.misses,
            "hitRate": self.hit_rate,
            "evictions": self.evictions,
            "hitsInMemory": self.hits_in_memory,
            "hitsOnDisk": self.hits_on_disk,
            "elements": self.elements,
            "elementsOnDisk": self.elements_on_disk,
            "elementsInMemory": self.elements_in_memory,
        })
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self, cache_name: &str) -> String {
        format!(
            r#"Cache Statistics
Cache: {}

ELEMENTS
  Total:       {}
  In memory:   {}
  On disk:     {}

ACCESS
  Hits:        {} ({} memory, {} disk)
  Misses:      {}
  Hit Rate:    {}%
  Avg Get:     {:.3} ms

EVICTION
  Evictions:   {}
"#,
            cache_name,
            self.elements,
            self.elements_in_memory,
            self.elements_on_disk,
            self.hits,
            self.hits_in_memory,
            self.hits_on_disk,
            self.misses,
            self.hit_rate,
            self.average_get_time,
            self.evictions,
        )
    }
}
