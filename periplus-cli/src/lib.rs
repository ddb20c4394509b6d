//! Command-line interface for Periplus data synchronisation.
#![forbid(unsafe_code)]

mod error;
mod sync;

use clap::{Parser, Subcommand};

pub use error::CliError;
use sync::SyncArgs;

const ARG_API_URL: &str = "api-url";
const ARG_CACHE_DB: &str = "cache-db";
const ARG_DEFAULT_SOURCE: &str = "default-source";
const ARG_SOURCES: &str = "sources";
const ARG_SITE_LIMIT: &str = "site-limit";
const ENV_CACHE_DB: &str = "PERIPLUS_CMDS_SYNC_CACHE_DB";

/// Run the Periplus CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] when argument parsing, configuration layering or
/// the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Sync(args) => sync::run_sync(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "periplus",
    about = "Fetch, cache and summarise archaeological site datasets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bootstrap the site store, load extra sources and refresh the cache.
    Sync(SyncArgs),
}

#[cfg(test)]
mod tests;
