//! Two-tier element storage.
//!
//! A cache keeps its elements in a capacity-bounded memory tier that
//! overflows, least recently used first, to a capacity-bounded disk tier.
//! Elements expire by time-to-live, time-to-idle, or never (eternal).
//!
//! - [`expiration`] decides liveness
//! - [`eviction`] keeps recency order and plans victim placement
//! - [`ElementStore`] applies both across the two tiers
//! - [`StatisticsCollector`] counts hits, misses, evictions and get latency
//! - [`ExpirySweeper`] purges dead elements in the background

mod disk;
mod element;
pub mod eviction;
pub mod expiration;
mod memory;
mod stats;
mod store;
mod sweeper;
mod types;

pub use disk::{DiskTier, LoadReport};
pub use element::Element;
pub use eviction::{plan_placement, Placement, RecencyIndex};
pub use expiration::{is_expired, Expiry};
pub use memory::MemoryTier;
pub use stats::{hit_rate_percent, CacheStatistics, StatisticsCollector};
pub use store::ElementStore;
pub use sweeper::ExpirySweeper;
pub use types::{CacheError, ElementOptions, Location};

pub(crate) use store::cache_directory;
