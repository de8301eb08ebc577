//! Logging infrastructure for tiercache.
//!
//! Provides structured logging to stderr and, optionally, a log file:
//! - stderr output stays out of the way of command output on stdout
//! - The log file is cleared on session start
//! - Level is configurable via the RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Filter used when RUST_LOG is not set (e.g., "info", "tiercache=debug")
    pub default_filter: String,
    /// Log file, cleared on start; stderr only when unset
    pub file: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_filter: default_filter(false).to_string(),
            file: None,
        }
    }
}

impl LoggingOptions {
    /// Options for a verbose or quiet session.
    pub fn verbose(verbose: bool) -> Self {
        Self {
            default_filter: default_filter(verbose).to_string(),
            file: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Default filter directive for a session.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize the global tracing subscriber.
///
/// # Returns
///
/// LoggingGuard that must be kept alive for file logging to work
///
/// # Errors
///
/// Returns error if the log file cannot be created or cleared, or if a
/// global subscriber is already installed.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let (file_layer, file_guard) = match &options.file {
        Some(path) => {
            let (directory, file_name) = prepare_log_file(path)?;
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    // RUST_LOG wins over the session default
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Create the log file's directory and clear the file.
///
/// Returns the directory and file name for the appender.
fn prepare_log_file(path: &Path) -> Result<(PathBuf, PathBuf), io::Error> {
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&directory)?;
    fs::write(directory.join(&file_name), "")?;
    Ok((directory, file_name))
}
