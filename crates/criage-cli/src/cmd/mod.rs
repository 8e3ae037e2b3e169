//! One module per subcommand.

pub mod config;
pub mod info;
pub mod install;
pub mod list;
pub mod package;
pub mod remove;
pub mod repo;
pub mod search;
pub mod update;

use std::sync::Arc;

use anyhow::{Context, Result};
use criage_core::{Config, NullReporter, PackageManager, Reporter};
use tracing::debug;

use crate::ui::ConsoleReporter;

/// Per-invocation settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub quiet: bool,
}

impl Session {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn reporter(&self) -> Arc<dyn Reporter> {
        if self.quiet {
            Arc::new(NullReporter)
        } else {
            Arc::new(ConsoleReporter::new())
        }
    }

    /// Load the configuration and build a package manager around it.
    pub fn manager(&self) -> Result<PackageManager> {
        let config = Config::load().context("Failed to load configuration")?;
        debug!(
            "Loaded configuration with {} enabled repositories",
            config.repositories().len()
        );
        PackageManager::new(config, self.reporter()).context("Failed to initialize package manager")
    }
}
