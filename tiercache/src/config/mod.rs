//! Configuration for the cache registry and its caches.
//!
//! [`CacheConfig`] holds the settings of one named cache and
//! [`RegistryConfig`] the persistent root, the settings used for caches added
//! by name only, and the caches to create on open. Both can be built in code
//! or loaded from an INI file:
//!
//! ```ini
//! [registry]
//! root = ~/.cache/tiercache
//!
//! [defaults]
//! memory_capacity = 2000
//! disk_capacity = 10000
//! disk_persistent = true
//! default_eternal = true
//! sweep_interval = 5s
//!
//! [cache:sessions]
//! memory_capacity = 500
//! default_eternal = false
//! ```
//!
//! # Example
//!
//! ```
//! use tiercache::config::{CacheConfig, RegistryConfig};
//!
//! let config = RegistryConfig::from_ini_str("[cache:sessions]\nmemory_capacity = 500\n")?;
//! assert_eq!(config.cache("sessions").map(|c| c.memory_capacity), Some(500));
//!
//! let config = RegistryConfig::new("/tmp/caches")
//!     .with_cache("pages", CacheConfig::default().with_disk_capacity(100));
//! assert_eq!(config.caches.len(), 1);
//! # Ok::<(), tiercache::config::ConfigFileError>(())
//! ```

mod defaults;
mod duration;
mod file;
mod parser;
mod settings;

pub use defaults::*;
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::ConfigFileError;
pub use settings::{CacheConfig, RegistryConfig};
