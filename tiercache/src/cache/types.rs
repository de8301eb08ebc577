//! Core types shared by the cache engine.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Cache engine errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Operation referenced a cache name that is not registered
    #[error("Unknown cache '{0}', create it first")]
    CacheNotFound(String),

    /// A cache with this name is already registered
    #[error("Cache '{0}' already exists")]
    CacheAlreadyExists(String),

    /// Key is empty
    #[error("Invalid key: keys must be non-empty")]
    InvalidKey,

    /// Persistent root cannot be created or is not writable
    #[error("Cannot initialize persistent storage at {path}: {source}")]
    StorageInitialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry (or a store handle obtained from it) has been shut down
    #[error("Cache registry is closed")]
    RegistryClosed,

    /// Read or write against the persistent tier failed or timed out
    #[error("Persistent tier I/O failed for {path}: {reason}")]
    PersistentIo { path: PathBuf, reason: String },

    /// Rejected configuration value or cache name
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    pub(crate) fn persistent_io(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PersistentIo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Which tier an element currently resides in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Memory tier
    Memory,
    /// Persistent (disk) tier
    Disk,
}

/// Per-put expiry settings.
///
/// A zero `ttl` or `tti` counts as unset. When `eternal` is `None` the element
/// is eternal only if neither duration is set and the store defaults to
/// eternal elements.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tiercache::cache::ElementOptions;
///
/// let options = ElementOptions::new().with_ttl(Duration::from_secs(30));
/// assert_eq!(options.ttl, Some(Duration::from_secs(30)));
/// assert!(!options.resolve_eternal(true));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementOptions {
    /// Time-to-live measured from creation
    pub ttl: Option<Duration>,
    /// Time-to-idle measured from last access
    pub tti: Option<Duration>,
    /// Explicit eternal override
    pub eternal: Option<bool>,
}

impl ElementOptions {
    /// Options that defer everything to the store defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set time-to-live. Zero clears it.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = non_zero(ttl);
        self
    }

    /// Set time-to-idle. Zero clears it.
    pub fn with_tti(mut self, tti: Duration) -> Self {
        self.tti = non_zero(tti);
        self
    }

    /// Force the eternal flag regardless of ttl/tti.
    pub fn with_eternal(mut self, eternal: bool) -> Self {
        self.eternal = Some(eternal);
        self
    }

    /// Resolve the eternal flag against the store default.
    pub fn resolve_eternal(&self, default_eternal: bool) -> bool {
        match self.eternal {
            Some(eternal) => eternal,
            None if self.ttl.is_some() || self.tti.is_some() => false,
            None => default_eternal,
        }
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// Reject empty keys.
pub(crate) fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        Err(CacheError::InvalidKey)
    } else {
        Ok(())
    }
}
