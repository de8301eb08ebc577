//! Typed settings for caches and the registry.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::cache::CacheError;

/// Settings of one named cache.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tiercache::config::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_memory_capacity(100)
///     .with_disk_capacity(1000)
///     .with_sweep_interval(Duration::from_secs(1));
///
/// assert_eq!(config.memory_capacity, 100);
/// assert!(!config.disk_persistent);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum elements resident in memory
    pub memory_capacity: usize,
    /// Maximum elements resident on disk; zero disables overflow
    pub disk_capacity: usize,
    /// Keep the persistent tier across restarts
    pub disk_persistent: bool,
    /// Eternal flag for elements put without ttl/tti
    pub default_eternal: bool,
    /// Period of the background expiration sweep
    pub sweep_interval: Duration,
    /// Upper bound for one filesystem operation
    pub disk_io_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            disk_capacity: DEFAULT_DISK_CAPACITY,
            disk_persistent: DEFAULT_DISK_PERSISTENT,
            default_eternal: DEFAULT_ETERNAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            disk_io_timeout: DEFAULT_DISK_IO_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Settings used by [`CacheRegistry::add_cache`](crate::registry::CacheRegistry::add_cache)
    /// unless the registry config overrides them: eternal elements on a
    /// persistent disk tier.
    pub fn persistent_eternal() -> Self {
        Self {
            disk_persistent: true,
            default_eternal: true,
            ..Self::default()
        }
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_disk_capacity(mut self, capacity: usize) -> Self {
        self.disk_capacity = capacity;
        self
    }

    pub fn with_disk_persistent(mut self, persistent: bool) -> Self {
        self.disk_persistent = persistent;
        self
    }

    pub fn with_default_eternal(mut self, eternal: bool) -> Self {
        self.default_eternal = eternal;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_disk_io_timeout(mut self, timeout: Duration) -> Self {
        self.disk_io_timeout = timeout;
        self
    }

    /// Reject settings the store cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if self.disk_io_timeout.is_zero() {
            return Err(CacheError::InvalidConfig(
                "disk_io_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of a cache registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Persistent root; each cache owns `root/<name>`
    pub root: PathBuf,
    /// Settings for caches added by name only
    pub default_cache: CacheConfig,
    /// Caches created when the registry opens, in declaration order
    pub caches: Vec<(String, CacheConfig)>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(default_root())
    }
}

impl RegistryConfig {
    /// Registry rooted at `root` with no declared caches.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_cache: CacheConfig::persistent_eternal(),
            caches: Vec::new(),
        }
    }

    pub fn with_default_cache(mut self, config: CacheConfig) -> Self {
        self.default_cache = config;
        self
    }

    /// Declare a cache to create on open. A repeated name replaces the
    /// earlier declaration.
    pub fn with_cache(mut self, name: impl Into<String>, config: CacheConfig) -> Self {
        let name = name.into();
        match self.caches.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = config,
            None => self.caches.push((name, config)),
        }
        self
    }

    /// Settings of a declared cache.
    pub fn cache(&self, name: &str) -> Option<&CacheConfig> {
        self.caches
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, config)| config)
    }
}
