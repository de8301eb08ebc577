//! tiercache - Named two-tier caches with expiration and LRU overflow
//!
//! Each cache keeps recently used elements in memory and overflows the rest
//! to a persistent disk tier. Elements expire by time-to-live or
//! time-to-idle, or never when eternal.
//!
//! # High-Level API
//!
//! The [`registry`] module is the entry point:
//!
//! ```no_run
//! use std::time::Duration;
//! use tiercache::cache::ElementOptions;
//! use tiercache::config::RegistryConfig;
//! use tiercache::registry::CacheRegistry;
//!
//! # async fn example() -> Result<(), tiercache::cache::CacheError> {
//! let registry = CacheRegistry::open(RegistryConfig::new("/var/cache/myapp")).await?;
//! let pages = registry.add_cache("pages").await?;
//!
//! let options = ElementOptions::new().with_tti(Duration::from_secs(300));
//! pages.put_with("/index.html", b"<html/>".to_vec(), options).await?;
//! assert!(pages.get("/index.html").await?.is_some());
//!
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod logging;
pub mod registry;

/// Version of the tiercache library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
