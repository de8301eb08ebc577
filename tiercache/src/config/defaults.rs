//! Default values for cache and registry settings.

use std::path::PathBuf;
use std::time::Duration;

/// Maximum elements resident in a cache's memory tier.
pub const DEFAULT_MEMORY_CAPACITY: usize = 2000;

/// Maximum elements resident in a cache's persistent tier.
pub const DEFAULT_DISK_CAPACITY: usize = 10_000;

/// Whether the persistent tier survives a restart.
pub const DEFAULT_DISK_PERSISTENT: bool = false;

/// Whether elements without ttl/tti are eternal.
pub const DEFAULT_ETERNAL: bool = false;

/// Period of the background expiration sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for a single persistent-tier filesystem operation.
pub const DEFAULT_DISK_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory name used under the platform cache and config directories.
pub const APP_DIRECTORY: &str = "tiercache";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default registry root (`~/.cache/tiercache` on Linux).
pub fn default_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIRECTORY)
}

/// Get the path to the config directory (`~/.config/tiercache` on Linux).
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIRECTORY)
}

/// Get the path to the default config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
