//! criage - package manager client
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs, removes, updates, builds and publishes packages against one
//! or more criage registries.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.criage/
//! └── config.toml           # Client configuration
//! ./criage_modules/<name>/  # Local installs
//!     └── .criage/package.json
//! /usr/local/lib/criage/    # Global installs
//! ~/.cache/criage/          # Downloaded archives
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use criage_schema::ArchiveFormat;

#[derive(Debug, Parser)]
#[command(name = "criage")]
#[command(author, version, about = "criage - package manager client")]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a package
    Install {
        /// Package name, optionally with version: pkg or pkg@1.0.0
        package: String,
        /// Install into the global root
        #[arg(short, long)]
        global: bool,
        /// Exact version to install
        #[arg(short = 'v', long)]
        version: Option<String>,
        /// Reinstall even if already installed
        #[arg(short, long)]
        force: bool,
        /// Also install dev dependencies
        #[arg(short, long)]
        dev: bool,
        /// Target architecture
        #[arg(short, long)]
        arch: Option<String>,
        /// Target operating system
        #[arg(short, long)]
        os: Option<String>,
    },
    /// Remove an installed package
    #[command(alias = "remove")]
    Uninstall {
        /// Package name
        package: String,
        /// Remove from the global root
        #[arg(short, long)]
        global: bool,
        /// Accepted for compatibility; currently has no effect beyond a normal uninstall
        #[arg(short, long)]
        purge: bool,
    },
    /// Update one package, or every local package
    Update {
        /// Package name; all local packages when omitted
        package: Option<String>,
        /// Update in the global root
        #[arg(short, long, requires = "package")]
        global: bool,
    },
    /// Search configured repositories
    Search {
        /// Search query
        query: String,
    },
    /// List installed packages
    List {
        /// List global packages
        #[arg(short, long)]
        global: bool,
        /// Only packages with a newer registry version
        #[arg(long)]
        outdated: bool,
    },
    /// Show an installed package
    Info {
        /// Package name
        package: String,
        /// Look in the global root
        #[arg(short, long)]
        global: bool,
    },
    /// Create a new package skeleton
    Create {
        /// Package name
        name: String,
        /// Author
        #[arg(long, default_value = "")]
        author: String,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Build a package archive from the current directory
    Build {
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Archive format (tar.zst, tar.gz, tar, zip)
        #[arg(short, long)]
        format: Option<ArchiveFormat>,
        /// Compression level
        #[arg(short = 'c', long)]
        level: Option<i32>,
    },
    /// Build and upload the package in the current directory
    Publish {
        /// Registry URL; the highest-priority repository when omitted
        #[arg(long)]
        registry: Option<String>,
        /// Authorization token
        #[arg(long, env = "CRIAGE_TOKEN")]
        token: Option<String>,
    },
    /// Show the metadata embedded in a package archive
    Metadata {
        /// Archive file
        archive: PathBuf,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Query a repository
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print one value
    Get {
        /// Dotted key, e.g. compression.level
        key: String,
    },
    /// Change one value
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },
    /// Print every value
    List,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Server information
    Info {
        /// Repository name or URL
        repository: Option<String>,
    },
    /// Server statistics
    Stats {
        /// Repository name or URL
        repository: Option<String>,
    },
    /// Ask the server to rebuild its index
    Refresh {
        /// Repository name or URL
        repository: Option<String>,
        /// Authorization token
        #[arg(long, env = "CRIAGE_TOKEN")]
        token: Option<String>,
    },
    /// Browse published packages
    Packages {
        /// Repository name or URL
        repository: Option<String>,
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

/// Split `pkg@version` into its parts. A bare name has no version.
///
/// # Example
///
/// ```
/// use criage_cli::parse_package_spec;
///
/// assert_eq!(parse_package_spec("jq@1.7"), ("jq", Some("1.7")));
/// assert_eq!(parse_package_spec("jq"), ("jq", None));
/// ```
pub fn parse_package_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once('@') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => (name, Some(version)),
        _ => (spec, None),
    }
}
