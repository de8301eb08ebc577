//! Cache inspection and element CLI commands.

use std::time::Duration;

use clap::Subcommand;
use tiercache::cache::ElementOptions;
use tiercache::config::parse_duration;

use super::common::{Session, SessionOptions};
use crate::error::CliError;

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// List caches under the root with their element counts
    List,

    /// Show statistics for a cache
    Stats {
        /// Cache name
        cache: String,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a value
    Put {
        /// Cache name
        cache: String,

        /// Element key
        key: String,

        /// Value, stored as UTF-8 bytes
        value: String,

        /// Time-to-live (e.g., 30s, 5m)
        #[arg(long, value_parser = parse_duration)]
        ttl: Option<Duration>,

        /// Time-to-idle (e.g., 30s, 5m)
        #[arg(long, value_parser = parse_duration)]
        tti: Option<Duration>,

        /// Never expire, ignoring --ttl and --tti
        #[arg(long, conflicts_with_all = ["ttl", "tti"])]
        eternal: bool,
    },

    /// Print a stored value
    Get {
        /// Cache name
        cache: String,

        /// Element key
        key: String,
    },

    /// Remove a stored value
    Remove {
        /// Cache name
        cache: String,

        /// Element key
        key: String,
    },

    /// Remove every element of one cache, or of all caches
    Clear {
        /// Cache name; all caches when omitted
        cache: Option<String>,
    },
}

/// Run a cache subcommand against the registry selected by `options`.
pub async fn run(command: CacheCommands, options: &SessionOptions) -> Result<(), CliError> {
    let session = Session::open(options).await?;
    let result = dispatch(&session, command).await;
    // Flush even when the command failed
    session.close().await;
    result
}

async fn dispatch(session: &Session, command: CacheCommands) -> Result<(), CliError> {
    match command {
        CacheCommands::List => run_list(session).await,
        CacheCommands::Stats { cache, json } => run_stats(session, &cache, json).await,
        CacheCommands::Put {
            cache,
            key,
            value,
            ttl,
            tti,
            eternal,
        } => {
            let options = put_options(ttl, tti, eternal);
            run_put(session, &cache, key, value, options).await
        }
        CacheCommands::Get { cache, key } => run_get(session, &cache, &key).await,
        CacheCommands::Remove { cache, key } => run_remove(session, &cache, &key).await,
        CacheCommands::Clear { cache } => run_clear(session, cache.as_deref()).await,
    }
}

/// Element options from command-line flags.
fn put_options(ttl: Option<Duration>, tti: Option<Duration>, eternal: bool) -> ElementOptions {
    let mut options = ElementOptions::new();
    if let Some(ttl) = ttl {
        options = options.with_ttl(ttl);
    }
    if let Some(tti) = tti {
        options = options.with_tti(tti);
    }
    if eternal {
        options = options.with_eternal(true);
    }
    options
}

async fn run_list(session: &Session) -> Result<(), CliError> {
    let names = session.discover_caches().await?;
    println!("Cache root: {}", session.registry().root().display());

    if names.is_empty() {
        println!("No caches found.");
        return Ok(());
    }

    println!();
    println!("{:<24} {:>10} {:>10}", "NAME", "MEMORY", "DISK");
    for name in names {
        let stats = session.cache(&name).await?.statistics().await?;
        println!(
            "{:<24} {:>10} {:>10}",
            name, stats.elements_in_memory, stats.elements_on_disk
        );
    }
    Ok(())
}

async fn run_stats(session: &Session, cache: &str, json: bool) -> Result<(), CliError> {
    let stats = session.cache(cache).await?.statistics().await?;
    if json {
        let text = serde_json::to_string_pretty(&stats.to_json())
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", stats.format(cache));
    }
    Ok(())
}

async fn run_put(
    session: &Session,
    cache: &str,
    key: String,
    value: String,
    options: ElementOptions,
) -> Result<(), CliError> {
    let store = session.cache(cache).await?;
    store.put_with(key.clone(), value, options).await?;
    println!("Stored '{}' in '{}'", key, cache);
    Ok(())
}

async fn run_get(session: &Session, cache: &str, key: &str) -> Result<(), CliError> {
    let store = session.cache(cache).await?;
    match store.get(key).await? {
        Some(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        None => Err(CliError::KeyNotFound {
            cache: cache.to_string(),
            key: key.to_string(),
        }),
    }
}

async fn run_remove(session: &Session, cache: &str, key: &str) -> Result<(), CliError> {
    let store = session.cache(cache).await?;
    if store.remove(key).await? {
        println!("Removed '{}' from '{}'", key, cache);
        Ok(())
    } else {
        Err(CliError::KeyNotFound {
            cache: cache.to_string(),
            key: key.to_string(),
        })
    }
}

async fn run_clear(session: &Session, cache: Option<&str>) -> Result<(), CliError> {
    match cache {
        Some(name) => {
            session.cache(name).await?.clear().await?;
            println!("Cleared '{}'", name);
        }
        None => {
            // Undeclared caches must be opened before clear_all can see them
            let names = session.discover_caches().await?;
            for name in &names {
                session.cache(name).await?;
            }
            session.registry().clear_all().await?;
            println!("Cleared {} cache(s)", names.len());
        }
    }
    Ok(())
}
