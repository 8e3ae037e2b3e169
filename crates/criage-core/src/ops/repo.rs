use criage_schema::{PackageListResponse, Repository, ServerInfo, Statistics, VersionEntry};

use super::{OpsError, PackageManager};
use crate::registry::RegistryError;

impl PackageManager {
    /// Pick a repository by name or URL.
    ///
    /// `None` selects the highest-priority enabled repository. A string
    /// starting with `http://` or `https://` that matches no configured
    /// repository is used as an ad-hoc one.
    pub fn repository(&self, target: Option<&str>) -> Result<Repository, OpsError> {
        let repos = self.config.repositories();
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            return repos
                .first()
                .map(|r| (*r).clone())
                .ok_or_else(|| OpsError::UnknownRepository("no enabled repositories".into()));
        };

        let trimmed = target.trim_end_matches('/');
        if let Some(repo) = repos
            .iter()
            .find(|r| r.name == target || r.url.trim_end_matches('/') == trimmed)
        {
            return Ok((*repo).clone());
        }
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(Repository::new("adhoc", target, 0));
        }
        Err(OpsError::UnknownRepository(target.to_string()))
    }

    /// Server self-description of the target repository.
    pub async fn repository_info(&self, target: Option<&str>) -> Result<ServerInfo, OpsError> {
        let repo = self.repository(target)?;
        Ok(self.registry.server_info(&repo).await?)
    }

    /// Download and package counts of the target repository.
    pub async fn repository_stats(&self, target: Option<&str>) -> Result<Statistics, OpsError> {
        let repo = self.repository(target)?;
        Ok(self.registry.stats(&repo).await?)
    }

    /// Ask the server to rebuild its index. `token` overrides the
    /// repository's configured token.
    pub async fn refresh_repository_index(
        &self,
        target: Option<&str>,
        token: Option<&str>,
    ) -> Result<(), OpsError> {
        let mut repo = self.repository(target)?;
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            repo.auth_token = Some(token.to_string());
        }
        self.registry.refresh_index(&repo).await?;
        self.reporter
            .success(&format!("Index of {} refreshed", repo.name));
        Ok(())
    }

    /// One page of the target repository's package listing.
    pub async fn repository_packages(
        &self,
        target: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<PackageListResponse, OpsError> {
        let repo = self.repository(target)?;
        Ok(self.registry.list_packages(&repo, page, limit).await?)
    }

    /// One version's registry entry, from the first repository that has it.
    pub async fn package_version(&self, name: &str, version: &str) -> Result<VersionEntry, OpsError> {
        let mut reason = "no repositories configured".to_string();
        for repo in self.config.repositories() {
            match self.registry.get_version(repo, name, version).await {
                Ok(v) => return Ok(v),
                Err(e) => reason = e.to_string(),
            }
        }
        Err(RegistryError::NotFound {
            name: format!("{name}@{version}"),
            reason,
        }
        .into())
    }
}
