//! Package lifecycle operations.
//!
//! [`PackageManager`] owns every collaborator an operation needs: the
//! registry client (with its rate limiter), the installed-package store,
//! the archive service, the configuration and a reporter. Nothing is
//! process-global, so independent managers can coexist.

mod build;
mod error;
mod install;
mod remove;
mod repo;
mod update;

pub use build::{BuildOutput, BuildRequest, PublishRequest};
pub use error::OpsError;
pub use install::{InstallOutcome, InstallRequest};
pub use update::{UpdateOutcome, UpdateSummary};

use std::sync::Arc;

use criage_schema::{PackageInfo, Platform, SearchResult};
use tracing::warn;

use crate::config::Config;
use crate::io::{ArchiveService, TarArchiver};
use crate::registry::RegistryClient;
use crate::reporter::Reporter;
use crate::store::LocalPackageRegistry;

/// Outbound registry requests per second.
pub const REQUESTS_PER_SECOND: i64 = 5;

/// Entry point for every package operation.
pub struct PackageManager {
    config: Config,
    registry: RegistryClient,
    store: LocalPackageRegistry,
    archiver: Arc<dyn ArchiveService>,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("installed", &self.store.len())
            .field("repositories", &self.config.repositories.len())
            .finish_non_exhaustive()
    }
}

impl PackageManager {
    /// Build a manager and load installed packages from both scopes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config, reporter: Arc<dyn Reporter>) -> Result<Self, OpsError> {
        Self::with_archiver(config, reporter, Arc::new(TarArchiver))
    }

    /// Like [`new`](Self::new) with a custom archive service.
    pub fn with_archiver(
        config: Config,
        reporter: Arc<dyn Reporter>,
        archiver: Arc<dyn ArchiveService>,
    ) -> Result<Self, OpsError> {
        let registry = RegistryClient::new(config.request_timeout(), REQUESTS_PER_SECOND)?;
        let store = LocalPackageRegistry::load(&config.root(false), &config.root(true));
        Ok(Self {
            config,
            registry,
            store,
            archiver,
            reporter,
        })
    }

    /// Configuration this manager was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installed packages of both scopes.
    pub fn store(&self) -> &LocalPackageRegistry {
        &self.store
    }

    /// Shared registry client.
    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Stop background activity.
    pub fn close(&self) {
        self.registry.close();
    }

    /// Installed record for `name` in one scope.
    pub fn info(&self, name: &str, global: bool) -> Result<PackageInfo, OpsError> {
        self.store
            .get(name, global)
            .ok_or_else(|| OpsError::NotInstalled(name.to_string()))
    }

    /// Installed packages of one scope, sorted by name. With `outdated`,
    /// only those whose latest registry version differs.
    pub async fn list(&self, global: bool, outdated: bool) -> Vec<PackageInfo> {
        let repos = self.config.repositories();
        let platform = Platform::current();
        let (repos, platform) = (&repos, &platform);
        self.store
            .list(global, outdated, |name| async move {
                self.registry
                    .resolve(repos, &name, None, platform)
                    .await
                    .ok()
                    .map(|found| found.version.version)
            })
            .await
    }

    /// Search every enabled repository. A failing repository is reported
    /// and skipped. Results are sorted by score, highest first.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let mut results = Vec::new();
        for repo in self.config.repositories() {
            match self.registry.search(repo, query).await {
                Ok(hits) => results.extend(hits),
                Err(e) => {
                    warn!("Search in {} failed: {e}", repo.name);
                    self.reporter
                        .warning(&format!("Search in repository {} failed: {e}", repo.name));
                }
            }
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }
}
