//! tiercache CLI - operate on the named caches under a cache root.
//!
//! Every invocation opens the registry, runs one command and shuts the
//! registry down again, so elements put by one invocation are read back from
//! disk by the next.

mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use tiercache::logging::{init_logging, LoggingOptions};

use commands::cache::CacheCommands;
use commands::common::SessionOptions;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tiercache")]
#[command(version = tiercache::VERSION)]
#[command(about = "Inspect and operate tiercache cache roots", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/tiercache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache root, overriding the configuration file
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CacheCommands,
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            config: self.config.clone(),
            root: self.root.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging = match init_logging(&LoggingOptions::verbose(cli.verbose)) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e).exit(),
    };

    let options = cli.session_options();
    if let Err(e) = commands::cache::run(cli.command, &options).await {
        e.exit();
    }
}
