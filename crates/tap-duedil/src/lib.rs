//! tap-duedil
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Singer tap for the DueDil company data API.
//!
//! # Overview
//!
//! - **Discovery**: print a catalog of every stream (`tap-duedil discover`)
//! - **Company search**: run a search and cache the companies found
//!   (`tap-duedil query`)
//! - **Sync**: extract every selected per-company stream for the cached
//!   companies, checkpointing after each chunk (`tap-duedil sync`)
//!
//! Records, schemas and state go to stdout as Singer messages. Logs go to
//! stderr.

pub mod api;
pub mod catalog;
pub mod checkpoint;
pub mod commands;
pub mod company_cache;
pub mod config;
pub mod error;
pub mod pagination;
pub mod schema;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use catalog::Catalog;
pub use checkpoint::CheckpointState;
pub use config::Config;
pub use error::{Result, TapError};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Singer tap for DueDil company data
#[derive(Parser, Debug)]
#[command(name = "tap-duedil")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load schema documents from this directory instead of the built-in set
    #[arg(long, env = "TAP_DUEDIL_SCHEMAS_DIR", global = true)]
    pub schemas_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the catalog of available streams
    Discover,

    /// Search for companies and write the company cache
    Query {
        /// Config file
        #[arg(short, long)]
        config: PathBuf,

        /// Catalog file
        #[arg(short = 'p', long = "properties", visible_alias = "catalog")]
        catalog: PathBuf,

        /// Company cache to write, one JSON object per line
        #[arg(long)]
        companies: PathBuf,

        /// JSON file with the search criteria
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Sync per-company streams for every cached company
    Sync {
        /// Config file
        #[arg(short, long)]
        config: PathBuf,

        /// Catalog file
        #[arg(short = 'p', long = "properties", visible_alias = "catalog")]
        catalog: PathBuf,

        /// Company cache written by `query`
        #[arg(long)]
        companies: PathBuf,

        /// State file; read at start and rewritten on every checkpoint
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Streams to sync (default: every stream except company_query)
        #[arg(long, num_args = 1..)]
        streams: Vec<String>,
    },
}
