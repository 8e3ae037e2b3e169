use criage_schema::{PackageName, Platform, Version};
use tracing::{info, warn};

use super::{InstallRequest, OpsError, PackageManager};

/// Result of updating one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed version already matches the registry's latest.
    UpToDate { version: Version },
    /// Reinstalled at a newer registry version.
    Updated { from: Version, to: Version },
}

/// Result of updating every local package.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Name, previous version and new version.
    pub updated: Vec<(PackageName, Version, Version)>,
    /// Packages already at the latest version.
    pub up_to_date: Vec<PackageName>,
    /// Packages whose update failed, with the reason.
    pub failed: Vec<(PackageName, OpsError)>,
}

impl UpdateSummary {
    /// True when nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl PackageManager {
    /// Bring one installed package to the latest version for the running
    /// platform.
    pub async fn update(&self, name: &str, global: bool) -> Result<UpdateOutcome, OpsError> {
        let current = self.info(name, global)?;

        let repos = self.config.repositories();
        let latest = self
            .registry
            .resolve(&repos, name, None, &Platform::current())
            .await?
            .version
            .version;

        if latest == current.version {
            info!("{name} is up to date ({latest})");
            return Ok(UpdateOutcome::UpToDate { version: latest });
        }

        info!("Updating {name} {} -> {latest}", current.version);
        let req = InstallRequest {
            name: name.to_string(),
            version: Some(latest.to_string()),
            global,
            force: true,
            ..InstallRequest::default()
        };
        self.install(&req).await?;
        Ok(UpdateOutcome::Updated {
            from: current.version,
            to: latest,
        })
    }

    /// Update every local-scope package. Failures are collected, never
    /// fatal.
    pub async fn update_all(&self) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        for pkg in self.store.snapshot(false) {
            match self.update(&pkg.name, false).await {
                Ok(UpdateOutcome::UpToDate { .. }) => summary.up_to_date.push(pkg.name),
                Ok(UpdateOutcome::Updated { from, to }) => {
                    summary.updated.push((pkg.name, from, to));
                }
                Err(e) => {
                    warn!("Failed to update {}: {e}", pkg.name);
                    self.reporter.failed(&pkg.name, &e.to_string());
                    summary.failed.push((pkg.name, e));
                }
            }
        }
        summary
    }
}
