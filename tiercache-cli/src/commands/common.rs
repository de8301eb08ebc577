//! Shared setup for commands: configuration loading and registry access.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tiercache::cache::{CacheError, ElementStore};
use tiercache::config::{CacheConfig, RegistryConfig};
use tiercache::registry::CacheRegistry;
use tracing::debug;

use crate::error::CliError;

/// Global options that decide which registry a command runs against.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Config file to load instead of the default location
    pub config: Option<PathBuf>,
    /// Cache root overriding the configured one
    pub root: Option<PathBuf>,
}

/// Load the registry configuration for a command.
pub fn load_config(options: &SessionOptions) -> Result<RegistryConfig, CliError> {
    let mut config = match &options.config {
        Some(path) => RegistryConfig::load_from(path)?,
        None => RegistryConfig::load()?,
    };
    if let Some(root) = &options.root {
        config.root = root.clone();
    }
    Ok(config)
}

/// An open registry for the duration of one command.
///
/// Must be finished with [`Session::close`] so memory-resident elements
/// reach disk before the process exits.
pub struct Session {
    registry: CacheRegistry,
}

impl Session {
    pub async fn open(options: &SessionOptions) -> Result<Self, CliError> {
        let config = load_config(options)?;
        debug!(root = %config.root.display(), "Opening cache root");
        let registry = CacheRegistry::open(config).await?;
        Ok(Self { registry })
    }

    /// Handle to `name`, created from the defaults if it is not declared.
    ///
    /// Undeclared caches are always disk-persistent so their elements
    /// survive between invocations.
    pub async fn cache(&self, name: &str) -> Result<Arc<ElementStore>, CliError> {
        match self.registry.get_cache(name) {
            Ok(store) => Ok(store),
            Err(CacheError::CacheNotFound(_)) => {
                let config = persistent_defaults(self.registry.default_cache_config());
                Ok(self.registry.create_cache(name, config).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Declared caches plus every cache directory found under the root.
    pub async fn discover_caches(&self) -> Result<Vec<String>, CliError> {
        let mut names = self.registry.cache_names()?;
        for name in cache_directories(self.registry.root()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Flush every cache to disk and close the registry.
    pub async fn close(self) {
        self.registry.shutdown().await;
    }
}

/// Defaults for a cache created on demand.
pub fn persistent_defaults(defaults: &CacheConfig) -> CacheConfig {
    defaults.clone().with_disk_persistent(true)
}

/// Names of the subdirectories of `root`.
fn cache_directories(root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect()
}
