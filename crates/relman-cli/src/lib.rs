//! relman - release manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Builds a release with external tools, keeps the local release directory
//! consistent with the last published GitHub release, prunes old packages
//! and uploads the result as a draft release.
//!
//! # Layout
//!
//! ```text
//! relman.toml
//! releases/     # Persistent: packages + RELEASES manifest
//! staging/      # Scratch, recreated by every deploy
//! ```

pub mod cmd;
pub mod ops;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version reported by `--version`, derived from git at build time.
pub const VERSION: &str = env!("RELMAN_VERSION");

#[derive(Debug, Parser)]
#[command(name = "relman")]
#[command(author, version = VERSION, about = "relman - build, prune, sync and publish releases")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "RELMAN_CONFIG", default_value = "relman.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build, prune and publish a new release
    Deploy {
        /// Release version (default: YYYY.Mdd.N from today's date)
        #[arg(long)]
        version: Option<String>,
        /// Skip the build steps
        #[arg(long)]
        no_build: bool,
        /// Skip uploading to GitHub
        #[arg(long)]
        no_upload: bool,
    },
    /// Remove old packages from the release directory
    Prune,
    /// Report manifest entries with no local file
    Check,
    /// Refresh the release directory from the last published release
    Sync,
    /// Upload the release directory to a release
    Publish {
        /// Release version (tag) to upload to
        #[arg(long)]
        version: String,
    },
    /// Print the version the next deploy would use
    Version,
}
