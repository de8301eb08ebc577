//! Registry of named caches.
//!
//! The registry owns every [`ElementStore`] and its [`ExpirySweeper`], hands
//! out shared store handles, and coordinates shutdown. It is a plain value:
//! construct one with [`CacheRegistry::open`] and share it (usually in an
//! `Arc`) with whoever needs caches.
//!
//! # Example
//!
//! ```no_run
//! use tiercache::config::{CacheConfig, RegistryConfig};
//! use tiercache::registry::CacheRegistry;
//!
//! # async fn example() -> Result<(), tiercache::cache::CacheError> {
//! let registry = CacheRegistry::open(RegistryConfig::new("/var/cache/myapp")).await?;
//!
//! let sessions = registry
//!     .create_cache("sessions", CacheConfig::default().with_memory_capacity(500))
//!     .await?;
//! sessions.put("user:1", b"alice".to_vec()).await?;
//!
//! let stats = registry.statistics("sessions").await?;
//! println!("{}", stats.format("sessions"));
//!
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::{
    cache_directory, CacheError, CacheStatistics, ElementStore, ExpirySweeper,
};
use crate::config::{CacheConfig, RegistryConfig};

/// File written and removed to check that the root is writable.
const PROBE_FILE: &str = ".tiercache-probe";

/// Lifecycle of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Accepting operations
    Active,
    /// Shutdown in progress, new operations are rejected
    ShuttingDown,
    /// Shut down, every operation fails
    Closed,
}

/// A store with its background sweep.
struct RegisteredCache {
    store: Arc<ElementStore>,
    sweeper: ExpirySweeper,
}

/// Named caches under one persistent root.
///
/// Dropping a registry without [`shutdown`](Self::shutdown) stops the
/// sweepers but does not persist memory-resident elements.
pub struct CacheRegistry {
    /// Persistent root; each cache owns a subdirectory
    root: PathBuf,
    /// Settings for [`add_cache`](Self::add_cache)
    default_cache: CacheConfig,
    /// Registered caches by name
    caches: RwLock<HashMap<String, RegisteredCache>>,
    /// Serializes cache creation, removal and shutdown
    lifecycle: Mutex<()>,
    state: RwLock<RegistryState>,
}

impl CacheRegistry {
    /// Open a registry, creating its root and every declared cache.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`CacheError::StorageInitialization`] if the root cannot be created
    /// or is not writable, or any error from creating a declared cache.
    pub async fn open(config: RegistryConfig) -> Result<Self, CacheError> {
        let RegistryConfig {
            root,
            default_cache,
            caches,
        } = config;

        prepare_root(&root).await?;
        default_cache.validate()?;

        let registry = Self {
            root,
            default_cache,
            caches: RwLock::new(HashMap::new()),
            lifecycle: Mutex::new(()),
            state: RwLock::new(RegistryState::Active),
        };

        for (name, config) in caches {
            registry.create_cache(&name, config).await?;
        }

        info!(
            root = %registry.root.display(),
            caches = registry.caches.read().len(),
            "Cache registry opened"
        );

        Ok(registry)
    }

    /// Create and register a cache.
    ///
    /// # Errors
    ///
    /// - [`CacheError::CacheAlreadyExists`] if the name is taken
    /// - [`CacheError::InvalidConfig`] if the name is not a single path
    ///   component or the settings are unusable
    /// - [`CacheError::StorageInitialization`] if the cache directory cannot
    ///   be created
    pub async fn create_cache(
        &self,
        name: &str,
        config: CacheConfig,
    ) -> Result<Arc<ElementStore>, CacheError> {
        self.ensure_active()?;
        validate_cache_name(name)?;

        let _lifecycle = self.lifecycle.lock().await;
        self.ensure_active()?;
        if self.caches.read().contains_key(name) {
            return Err(CacheError::CacheAlreadyExists(name.to_string()));
        }

        let directory = cache_directory(&self.root, name);
        let store = Arc::new(ElementStore::open(name, config, directory).await?);
        let sweeper = ExpirySweeper::start(store.clone());

        self.caches.write().insert(
            name.to_string(),
            RegisteredCache {
                store: store.clone(),
                sweeper,
            },
        );
        // Shutdown started while the store was opening
        if self.state() != RegistryState::Active {
            store.mark_closed();
        }

        info!(cache = %name, "Cache created");
        Ok(store)
    }

    /// Create a cache with the registry's default settings.
    pub async fn add_cache(&self, name: &str) -> Result<Arc<ElementStore>, CacheError> {
        self.create_cache(name, self.default_cache.clone()).await
    }

    /// Handle to a registered cache. Never creates one.
    pub fn get_cache(&self, name: &str) -> Result<Arc<ElementStore>, CacheError> {
        self.ensure_active()?;
        self.caches
            .read()
            .get(name)
            .map(|cache| cache.store.clone())
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))
    }

    /// Detach and dispose of a cache.
    ///
    /// Outstanding handles fail with [`CacheError::RegistryClosed`]
    /// afterwards. A persistent cache keeps its elements on disk for the
    /// next time it is created; any other cache loses its directory.
    pub async fn remove_cache(&self, name: &str) -> Result<(), CacheError> {
        self.ensure_active()?;
        let _lifecycle = self.lifecycle.lock().await;
        self.ensure_active()?;

        let removed = self.caches.write().remove(name);
        let Some(cache) = removed else {
            return Err(CacheError::CacheNotFound(name.to_string()));
        };

        cache.store.mark_closed();
        cache.sweeper.shutdown().await;
        cache.store.destroy().await;

        info!(cache = %name, "Cache removed");
        Ok(())
    }

    /// Remove every element of every cache. Definitions and statistics are
    /// kept.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        self.ensure_active()?;
        for store in self.stores() {
            store.clear().await?;
        }
        debug!("All caches cleared");
        Ok(())
    }

    /// Names of registered caches, sorted.
    pub fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        self.ensure_active()?;
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Statistics snapshot of a registered cache.
    pub async fn statistics(&self, name: &str) -> Result<CacheStatistics, CacheError> {
        self.get_cache(name)?.statistics().await
    }

    /// Stop every sweeper, persist what needs persisting and close.
    ///
    /// New registry and store operations fail as soon as shutdown starts.
    /// Calling this again, concurrently or later, waits for the first call
    /// to finish and then returns.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == RegistryState::Active {
                *state = RegistryState::ShuttingDown;
            }
        }

        // Handles stop working before any in-flight lifecycle call finishes
        for store in self.stores() {
            store.mark_closed();
        }

        let _lifecycle = self.lifecycle.lock().await;
        if self.state() == RegistryState::Closed {
            return;
        }

        info!(root = %self.root.display(), "Cache registry shutting down");

        // Includes caches created while shutdown waited for the lifecycle lock
        let caches: Vec<(String, RegisteredCache)> = self.caches.write().drain().collect();
        for (_, cache) in &caches {
            cache.store.mark_closed();
        }
        for (name, cache) in caches {
            cache.sweeper.shutdown().await;
            cache.store.close().await;
            debug!(cache = %name, "Cache closed");
        }

        *self.state.write() = RegistryState::Closed;
        info!("Cache registry closed");
    }

    pub fn state(&self) -> RegistryState {
        *self.state.read()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings used by [`add_cache`](Self::add_cache).
    pub fn default_cache_config(&self) -> &CacheConfig {
        &self.default_cache
    }

    fn ensure_active(&self) -> Result<(), CacheError> {
        match self.state() {
            RegistryState::Active => Ok(()),
            RegistryState::ShuttingDown | RegistryState::Closed => Err(CacheError::RegistryClosed),
        }
    }

    fn stores(&self) -> Vec<Arc<ElementStore>> {
        self.caches
            .read()
            .values()
            .map(|cache| cache.store.clone())
            .collect()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("root", &self.root)
            .field("state", &self.state())
            .field("caches", &self.caches.read().len())
            .finish()
    }
}

/// Create the root if needed and check it is writable.
async fn prepare_root(root: &Path) -> Result<(), CacheError> {
    let storage_error = |source| CacheError::StorageInitialization {
        path: root.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(root)
        .await
        .map_err(storage_error)?;

    let probe = root.join(PROBE_FILE);
    tokio::fs::write(&probe, b"probe")
        .await
        .map_err(storage_error)?;
    tokio::fs::remove_file(&probe)
        .await
        .map_err(storage_error)?;
    Ok(())
}

/// Cache names become directory names, so they must be exactly one normal
/// path component.
fn validate_cache_name(name: &str) -> Result<(), CacheError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) if component == name => Ok(()),
        _ => Err(CacheError::InvalidConfig(format!(
            "invalid cache name '{}': must be a single, non-empty path component",
            name
        ))),
    }
}
