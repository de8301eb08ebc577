//! A single named cache: memory tier overflowing to a persistent tier.
//!
//! # Placement
//!
//! Every write lands in the memory tier. When that pushes the memory tier
//! over capacity, its least recently used element (the victim) moves to the
//! persistent tier. If the persistent tier is full, its own least recently
//! used element is deleted first. With zero persistent capacity victims are
//! simply deleted. Each victim counts as one eviction.
//!
//! A tier that is full only because of dead elements purges those first, so
//! a dead element never pushes out a live one. Purges are not evictions.
//!
//! Reads never move elements between tiers. An element read from disk stays
//! there until a later put places it back in memory.
//!
//! # Concurrency
//!
//! One async mutex guards both tiers. Every operation, including the
//! background sweep, runs its liveness check and its mutation under that
//! lock, so an element refreshed by a read can never be purged by a sweep
//! that looked at it earlier.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::disk::DiskTier;
use crate::cache::element::Element;
use crate::cache::eviction::{plan_placement, Placement};
use crate::cache::memory::MemoryTier;
use crate::cache::stats::{CacheStatistics, StatisticsCollector};
use crate::cache::types::{validate_key, CacheError, ElementOptions, Location};
use crate::config::CacheConfig;

/// Both tiers of a store, guarded together.
struct StoreState {
    memory: MemoryTier,
    disk: DiskTier,
}

/// Storage of one named cache.
///
/// Handed out by [`CacheRegistry`](crate::registry::CacheRegistry) as an
/// `Arc<ElementStore>`. Once the registry shuts down or the cache is removed,
/// every operation on the handle fails with [`CacheError::RegistryClosed`].
pub struct ElementStore {
    name: String,
    config: CacheConfig,
    state: Mutex<StoreState>,
    stats: StatisticsCollector,
    /// Operations are rejected
    closed: AtomicBool,
    /// Contents have been persisted or dropped
    released: AtomicBool,
}

impl ElementStore {
    /// Open a store whose persistent tier lives in `directory`.
    pub(crate) async fn open(
        name: impl Into<String>,
        config: CacheConfig,
        directory: PathBuf,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let name = name.into();

        let (disk, report) = DiskTier::open(
            directory,
            config.disk_capacity,
            config.disk_io_timeout,
            config.disk_persistent,
        )
        .await?;

        info!(
            cache = %name,
            memory_capacity = config.memory_capacity,
            disk_capacity = config.disk_capacity,
            persistent = config.disk_persistent,
            loaded = report.loaded,
            "Cache store opened"
        );

        Ok(Self {
            name,
            state: Mutex::new(StoreState {
                memory: MemoryTier::new(config.memory_capacity),
                disk,
            }),
            config,
            stats: StatisticsCollector::new(),
            closed: AtomicBool::new(false),
            released: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `value` under `key` using the store's expiry defaults.
    pub async fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), CacheError> {
        self.put_with(key, value, ElementOptions::new()).await
    }

    /// Store `value` under `key` with explicit expiry settings.
    ///
    /// Replaces any existing element, live or not.
    pub async fn put_with(
        &self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        options: ElementOptions,
    ) -> Result<(), CacheError> {
        let key = key.into();
        validate_key(&key)?;
        let element = Element::from_options(
            key,
            value.into(),
            &options,
            self.config.default_eternal,
            SystemTime::now(),
        );
        self.put_element(element).await
    }

    /// Store a pre-built element, keeping its timestamps and expiry settings.
    pub async fn put_element(&self, element: Element) -> Result<(), CacheError> {
        validate_key(element.key())?;
        let mut state = self.lock().await?;
        self.insert(&mut state, element).await;
        Ok(())
    }

    /// Store `value` only if no live element exists for `key`.
    ///
    /// Returns `true` if the value was stored.
    pub async fn put_if_absent(
        &self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Result<bool, CacheError> {
        self.put_if_absent_with(key, value, ElementOptions::new())
            .await
    }

    /// [`put_if_absent`](Self::put_if_absent) with explicit expiry settings.
    pub async fn put_if_absent_with(
        &self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        options: ElementOptions,
    ) -> Result<bool, CacheError> {
        let key = key.into();
        validate_key(&key)?;
        let mut state = self.lock().await?;
        let now = SystemTime::now();

        self.purge_if_expired(&mut state, &key, now).await;
        if state.memory.contains(&key) || state.disk.contains(&key) {
            return Ok(false);
        }

        let element = Element::from_options(
            key,
            value.into(),
            &options,
            self.config.default_eternal,
            now,
        );
        self.insert(&mut state, element).await;
        Ok(true)
    }

    /// Value of the live element stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.get_element(key).await?.map(Element::into_value))
    }

    /// Snapshot of the live element stored under `key`, after recording
    /// this access.
    ///
    /// A failed disk read drops the element and returns
    /// [`CacheError::PersistentIo`]; later reads see it as absent.
    pub async fn get_element(&self, key: &str) -> Result<Option<Element>, CacheError> {
        let started = Instant::now();
        let result = self.lookup(key).await;
        if !matches!(result, Err(CacheError::RegistryClosed)) {
            self.stats.record_get_time(started.elapsed());
        }
        result
    }

    async fn lookup(&self, key: &str) -> Result<Option<Element>, CacheError> {
        let mut guard = self.lock().await?;
        let state = &mut *guard;
        let now = SystemTime::now();

        match state.memory.get(key).map(|element| element.is_expired(now)) {
            Some(true) => {
                state.memory.remove(key);
                debug!(cache = %self.name, key = %key, "Expired element purged on read");
                self.stats.record_miss();
                return Ok(None);
            }
            Some(false) => {
                let element = state.memory.touch(key, now).cloned();
                self.stats.record_hit(Location::Memory);
                return Ok(element);
            }
            None => {}
        }

        let Some(expiry) = state.disk.expiry(key).copied() else {
            self.stats.record_miss();
            return Ok(None);
        };

        if expiry.is_expired(now) {
            state.disk.remove(key).await;
            debug!(cache = %self.name, key = %key, "Expired element purged on read");
            self.stats.record_miss();
            return Ok(None);
        }

        match state.disk.read(key).await {
            Ok(Some(mut element)) => {
                state.disk.touch(key, now);
                element.touch(now);
                self.stats.record_hit(Location::Disk);
                Ok(Some(element))
            }
            Ok(None) => {
                self.stats.record_miss();
                Ok(None)
            }
            Err(e) => {
                warn!(cache = %self.name, key = %key, error = %e, "Dropping unreadable element");
                state.disk.remove(key).await;
                self.stats.record_miss();
                Err(e)
            }
        }
    }

    /// Remove the element stored under `key`.
    ///
    /// Returns `true` only if a live element was removed; dead elements are
    /// purged but report `false`.
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let mut state = self.lock().await?;
        let now = SystemTime::now();

        if let Some(element) = state.memory.remove(key) {
            return Ok(!element.is_expired(now));
        }
        Ok(state
            .disk
            .remove(key)
            .await
            .is_some_and(|expiry| !expiry.is_expired(now)))
    }

    /// Number of live elements across both tiers.
    pub async fn size(&self) -> Result<usize, CacheError> {
        let state = self.lock().await?;
        let now = SystemTime::now();
        Ok(state.memory.live_count(now) + state.disk.live_count(now))
    }

    /// Whether a live element is stored under `key`.
    ///
    /// Does not count as an access.
    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let state = self.lock().await?;
        let now = SystemTime::now();
        let live = match state.memory.get(key) {
            Some(element) => !element.is_expired(now),
            None => state
                .disk
                .expiry(key)
                .is_some_and(|expiry| !expiry.is_expired(now)),
        };
        Ok(live)
    }

    /// Remove every element from both tiers. Statistics are kept.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.lock().await?;
        let removed = state.memory.len() + state.disk.len();
        state.memory.clear();
        state.disk.clear().await;
        info!(cache = %self.name, removed, "Cache cleared");
        Ok(())
    }

    /// Purge every dead element from both tiers.
    ///
    /// Returns the number of elements purged.
    pub async fn evict_expired(&self) -> Result<usize, CacheError> {
        let mut guard = self.lock().await?;
        let state = &mut *guard;
        let now = SystemTime::now();

        let mut purged = 0;
        for key in state.memory.expired_keys(now) {
            if state.memory.remove(&key).is_some() {
                purged += 1;
            }
        }
        for key in state.disk.expired_keys(now) {
            if state.disk.remove(&key).await.is_some() {
                purged += 1;
            }
        }

        if purged > 0 {
            debug!(cache = %self.name, purged, "Expired elements purged");
        }
        Ok(purged)
    }

    /// Snapshot of this cache's statistics.
    pub async fn statistics(&self) -> Result<CacheStatistics, CacheError> {
        let state = self.lock().await?;
        let now = SystemTime::now();
        Ok(self
            .stats
            .snapshot(state.memory.live_count(now), state.disk.live_count(now)))
    }

    /// Zero the hit, miss, eviction and timing counters.
    pub fn reset_statistics(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.stats.reset();
        Ok(())
    }

    /// Keys resident in memory, least recently used first.
    pub async fn memory_resident_keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock().await?.memory.keys_lru_first())
    }

    /// Keys resident on disk, least recently used first.
    pub async fn disk_resident_keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock().await?.disk.keys_lru_first())
    }

    /// Directory holding this cache's persistent tier.
    pub async fn directory(&self) -> PathBuf {
        self.state.lock().await.disk.directory().to_path_buf()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reject further operations, then persist or drop the contents.
    ///
    /// A persistent store spools live memory elements to disk and rewrites
    /// disk entries whose access metadata changed. A scratch store deletes
    /// its element files. Returns `false` if the store was already closed.
    pub(crate) async fn close(&self) -> bool {
        self.mark_closed();
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        // Waits for any operation still holding the lock
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if self.config.disk_persistent {
            let spooled = self.spool_to_disk(state).await;
            let flushed = state.disk.flush().await;
            info!(
                cache = %self.name,
                spooled,
                flushed,
                on_disk = state.disk.len(),
                "Cache store closed"
            );
        } else {
            state.memory.clear();
            state.disk.clear().await;
            info!(cache = %self.name, "Cache store closed");
        }
        true
    }

    /// Reject further operations without touching the contents.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Close the store and, unless it is persistent, delete its directory.
    pub(crate) async fn destroy(&self) {
        self.close().await;
        if self.config.disk_persistent {
            return;
        }
        let mut state = self.state.lock().await;
        if let Err(e) = state.disk.destroy().await {
            warn!(cache = %self.name, error = %e, "Failed to delete cache directory");
        }
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.is_closed() {
            Err(CacheError::RegistryClosed)
        } else {
            Ok(())
        }
    }

    /// Acquire the store lock, failing if the store is or becomes closed.
    async fn lock(&self) -> Result<MutexGuard<'_, StoreState>, CacheError> {
        self.ensure_open()?;
        let guard = self.state.lock().await;
        self.ensure_open()?;
        Ok(guard)
    }

    /// Place an element in memory as most recently used, then rebalance.
    async fn insert(&self, state: &mut StoreState, element: Element) {
        // A key lives in exactly one tier
        state.disk.remove(element.key()).await;
        debug!(cache = %self.name, key = %element.key(), "Element stored");
        state.memory.insert(element);
        self.rebalance(state).await;
    }

    /// Drop the element under `key` if it is dead. Returns whether it was.
    async fn purge_if_expired(&self, state: &mut StoreState, key: &str, now: SystemTime) -> bool {
        if state.memory.get(key).is_some_and(|e| e.is_expired(now)) {
            state.memory.remove(key);
            return true;
        }
        if state.disk.expiry(key).is_some_and(|e| e.is_expired(now)) {
            state.disk.remove(key).await;
            return true;
        }
        false
    }

    /// Move memory victims out until the memory tier fits its capacity.
    ///
    /// Dead elements are purged before any live element is chosen as a
    /// victim, in either tier.
    async fn rebalance(&self, state: &mut StoreState) {
        if !state.memory.is_over_capacity() {
            return;
        }

        let now = SystemTime::now();
        let mut purged = 0;
        for key in state.memory.expired_keys(now) {
            if state.memory.remove(&key).is_some() {
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(cache = %self.name, purged, "Expired elements purged from memory");
        }

        while state.memory.is_over_capacity() {
            let Some(victim) = state.memory.take_victim() else {
                break;
            };

            self.stats.record_evictions(1);
            match plan_placement(state.disk.len(), state.disk.capacity()) {
                Placement::Discard => {
                    debug!(cache = %self.name, key = %victim.key(), "Victim discarded");
                }
                Placement::Overflow => self.overflow(state, &victim).await,
                Placement::EvictThenOverflow => {
                    if self.make_room_on_disk(state, now).await {
                        self.stats.record_evictions(1);
                    }
                    self.overflow(state, &victim).await;
                }
            }
        }
    }

    /// Free at least one disk slot.
    ///
    /// Dead elements are purged first. Returns `true` only if the tier was
    /// still full afterwards and its live LRU element had to be deleted.
    async fn make_room_on_disk(&self, state: &mut StoreState, now: SystemTime) -> bool {
        let mut purged = 0;
        for key in state.disk.expired_keys(now) {
            if state.disk.remove(&key).await.is_some() {
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(cache = %self.name, purged, "Expired elements purged from disk");
        }

        if !state.disk.is_full() {
            return false;
        }
        match state.disk.evict_lru().await {
            Some(key) => {
                debug!(cache = %self.name, key = %key, "Disk victim deleted");
                true
            }
            None => false,
        }
    }

    /// Write a victim to disk, dropping it if the write fails.
    async fn overflow(&self, state: &mut StoreState, victim: &Element) {
        match state.disk.write(victim).await {
            Ok(()) => debug!(cache = %self.name, key = %victim.key(), "Victim overflowed to disk"),
            Err(e) => warn!(
                cache = %self.name,
                key = %victim.key(),
                error = %e,
                "Overflow to disk failed, victim dropped"
            ),
        }
    }

    /// Move live memory elements to disk, most recently used kept when the
    /// disk tier runs out of room. Returns the number written.
    async fn spool_to_disk(&self, state: &mut StoreState) -> usize {
        let now = SystemTime::now();
        let mut spooled = 0;

        for element in state.memory.drain_lru_first() {
            if element.is_expired(now) || state.disk.capacity() == 0 {
                continue;
            }
            if state.disk.is_full() {
                self.make_room_on_disk(state, now).await;
            }
            match state.disk.write(&element).await {
                Ok(()) => spooled += 1,
                Err(e) => warn!(
                    cache = %self.name,
                    key = %element.key(),
                    error = %e,
                    "Failed to spool element to disk"
                ),
            }
        }
        spooled
    }
}

impl std::fmt::Debug for ElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementStore")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Directory of cache `name` under a registry root.
pub(crate) fn cache_directory(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}
