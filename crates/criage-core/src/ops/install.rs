//! Install pipeline: resolve, download, extract, dependencies, hooks,
//! materialize, record.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::Utc;
use criage_schema::{
    HookPoint, PackageInfo, PackageManifest, PackageName, Platform, Sha256Digest, Version,
};
use tracing::{debug, info, warn};

use super::{OpsError, PackageManager};
use crate::config::Config;
use crate::hooks::run_hooks;
use crate::io::{FileSelector, calculate_dir_size, copy_files};
use crate::paths::MANIFEST_FILE;
use crate::registry::ResolvedPackage;
use crate::store::LocalPackageRegistry;

/// What to install and how.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Package to install.
    pub name: String,
    /// Exact version; `None` for the latest.
    pub version: Option<String>,
    /// Install into the global root instead of the local one.
    pub global: bool,
    /// Reinstall even when present, wiping the install directory first.
    pub force: bool,
    /// Also install dev dependencies.
    pub dev: bool,
    /// Target architecture; defaults to the running one.
    pub arch: Option<String>,
    /// Target OS; defaults to the running one.
    pub os: Option<String>,
}

impl InstallRequest {
    /// Latest version, local scope, default flags.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// What [`PackageManager::install`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    /// Nothing was done; the package was already present.
    AlreadyInstalled(PackageInfo),
    /// Freshly installed (or reinstalled).
    Installed(PackageInfo),
}

impl InstallOutcome {
    /// The installed record either way.
    pub fn info(&self) -> &PackageInfo {
        match self {
            Self::AlreadyInstalled(info) | Self::Installed(info) => info,
        }
    }
}

type InstallFuture<'a> = Pin<Box<dyn Future<Output = Result<InstallOutcome, OpsError>> + Send + 'a>>;

/// Removes the downloaded archive on every exit path.
struct ArchiveGuard(PathBuf);

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Failed to remove {}: {e}", self.0.display());
            }
        }
    }
}

impl PackageManager {
    /// Install a package and, recursively, its missing dependencies.
    pub async fn install(&self, req: &InstallRequest) -> Result<InstallOutcome, OpsError> {
        let mut chain = Vec::new();
        self.install_inner(req, &mut chain).await
    }

    fn install_inner<'a>(
        &'a self,
        req: &'a InstallRequest,
        chain: &'a mut Vec<String>,
    ) -> InstallFuture<'a> {
        Box::pin(async move {
            if chain.iter().any(|n| n == &req.name) {
                let mut cycle = chain.clone();
                cycle.push(req.name.clone());
                return Err(OpsError::DependencyCycle(cycle.join(" -> ")));
            }

            if !req.force {
                if let Some(existing) = self.store.get(&req.name, req.global) {
                    let wanted = req.version.as_deref().filter(|v| !v.is_empty());
                    if wanted.is_none_or(|v| existing.version == v) {
                        info!("{} {} already installed", existing.name, existing.version);
                        return Ok(InstallOutcome::AlreadyInstalled(existing));
                    }
                }
            }

            chain.push(req.name.clone());
            let result = self.install_resolved(req, chain).await;
            chain.pop();
            result
        })
    }

    async fn install_resolved(
        &self,
        req: &InstallRequest,
        chain: &mut Vec<String>,
    ) -> Result<InstallOutcome, OpsError> {
        let platform = Platform::or_current(req.os.as_deref(), req.arch.as_deref());
        let repos = self.config.repositories();
        let resolved = self
            .registry
            .resolve(&repos, &req.name, req.version.as_deref(), &platform)
            .await?;

        let name = PackageName::new(&req.name);
        let version = resolved.version.version.clone();
        self.reporter.section(&format!("Installing {name} {version}"));

        let archive = self
            .fetch_archive(&name, &version, &resolved)
            .await
            .map_err(OpsError::during("download", &name))?;
        let _archive_guard = ArchiveGuard(archive.clone());

        let temp_root = self.config.temp_root();
        let scratch = std::fs::create_dir_all(&temp_root)
            .and_then(|()| {
                tempfile::Builder::new()
                    .prefix(&format!("install_{name}_{}_", Utc::now().timestamp()))
                    .tempdir_in(&temp_root)
            })
            .map_err(OpsError::during("create scratch space for", &name))?;

        self.reporter.extracting(&name, &version);
        let archiver = self.archiver.clone();
        let (archive_path, dest) = (archive.clone(), scratch.path().to_path_buf());
        let manifest = tokio::task::spawn_blocking(move || -> Result<PackageManifest, OpsError> {
            let format = archiver.detect_format(&archive_path)?;
            archiver.extract(&archive_path, &dest, format)?;
            Ok(Config::load_local_manifest(&dest)?)
        })
        .await
        .map_err(OpsError::from)
        .and_then(std::convert::identity)
        .map_err(OpsError::during("extract", &name))?;

        // Checked before anything under the install path is touched.
        FileSelector::new(&manifest.files, &[])
            .map_err(|e| OpsError::context("invalid file pattern", e))
            .map_err(OpsError::during("install", &name))?;

        for (dep, wanted) in manifest.effective_dependencies(req.dev) {
            if self.store.contains(&dep) {
                debug!("Dependency {dep} already satisfied");
                continue;
            }
            self.reporter.info(&format!("Installing dependency {dep} {wanted} of {name}"));
            let dep_req = InstallRequest {
                version: pinned_version(&wanted).map(str::to_string),
                ..InstallRequest::new(&dep)
            };
            self.install_inner(&dep_req, chain).await?;
        }

        run_hooks(
            HookPoint::PreInstall,
            manifest.hooks_for(HookPoint::PreInstall),
            Some(scratch.path()),
        )
        .await
        .map_err(OpsError::during("run pre-install hooks of", &name))?;

        self.reporter.installing(&name, &version);
        let install_path = self.config.install_path(&req.name, req.global);
        let record = PackageInfo {
            name: name.clone(),
            version: version.clone(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            install_date: Utc::now(),
            install_path: install_path.clone(),
            global: req.global,
            dependencies: manifest.dependencies.clone(),
            size: 0,
            files: manifest.files.clone(),
            scripts: manifest.scripts.clone(),
        };
        // A forced reinstall unpublishes the old record first; it comes back
        // only if its files are still on disk after a failure.
        let previous = if req.force {
            self.store.remove(&req.name, req.global)
        } else {
            None
        };
        let (src, force) = (scratch.path().to_path_buf(), req.force);
        let materialized = tokio::task::spawn_blocking(move || materialize(&src, force, record))
            .await
            .map_err(OpsError::from)
            .and_then(std::convert::identity);
        let record = match materialized {
            Ok(record) => record,
            Err(e) => {
                if let Some(previous) = previous.filter(|p| p.record_path().exists()) {
                    self.store.put(previous);
                }
                return Err(OpsError::during("install files of", &name)(e));
            }
        };
        self.store.put(record.clone());

        if let Err(e) = run_hooks(
            HookPoint::PostInstall,
            manifest.hooks_for(HookPoint::PostInstall),
            Some(&install_path),
        )
        .await
        {
            warn!("Post-install hook of {name} failed: {e}");
            self.reporter
                .warning(&format!("Post-install hook of {name} failed: {e}"));
        }

        self.reporter
            .done(&name, &version, "installed", Some(record.size));
        info!("Installed {name} {version} to {}", install_path.display());
        Ok(InstallOutcome::Installed(record))
    }

    /// Reuse a cached archive or download it into the cache.
    async fn fetch_archive(
        &self,
        name: &PackageName,
        version: &Version,
        resolved: &ResolvedPackage,
    ) -> Result<PathBuf, OpsError> {
        let cache_dir = self.config.cache_path(name, version);
        tokio::fs::create_dir_all(&cache_dir).await?;
        let dest = cache_dir.join(&resolved.file.filename);

        if tokio::fs::try_exists(&dest).await? {
            debug!("Using cached archive {}", dest.display());
            return Ok(dest);
        }

        let expected = if self.config.verify_hashes {
            Sha256Digest::parse(&resolved.file.checksum)
        } else {
            None
        };
        debug!("Downloading {} to {}", resolved.download_url, dest.display());
        let reporter = &self.reporter;
        self.registry
            .download(&resolved.download_url, &dest, expected.as_ref(), |current, total| {
                reporter.downloading(name, version, current, total);
            })
            .await
            .inspect_err(|e| reporter.failed(name, &e.to_string()))?;
        Ok(dest)
    }
}

/// Exact version from a dependency requirement such as `1.2.0` or
/// `=1.2.0`. Ranges and wildcards (`^1.2`, `~1`, `*`, `1.x`, `>=1`) yield
/// `None`, meaning the latest version.
fn pinned_version(requirement: &str) -> Option<&str> {
    let version = requirement.trim().trim_start_matches('=').trim_start();
    let exact = version.starts_with(|c: char| c.is_ascii_digit())
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
        && !version
            .split(['.', '-', '+'])
            .any(|part| part.eq_ignore_ascii_case("x"));
    exact.then_some(version)
}

/// Wipe (when forced), copy the selected files and persist the record.
/// A directory this call created is removed again if copying fails.
fn materialize(src: &Path, force: bool, mut record: PackageInfo) -> Result<PackageInfo, OpsError> {
    let dest = record.install_path.clone();
    if force && dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    let created = !dest.exists();
    std::fs::create_dir_all(&dest)?;

    let copy = || -> Result<(), OpsError> {
        let selector = FileSelector::new(&record.files, &[])
            .map_err(|e| OpsError::context("invalid file pattern", e))?;
        copy_files(src, &dest, &selector.select(src)?)?;
        // Uninstall hooks read the manifest from the install directory.
        std::fs::copy(src.join(MANIFEST_FILE), dest.join(MANIFEST_FILE))?;
        Ok(())
    };
    if let Err(e) = copy() {
        if created {
            std::fs::remove_dir_all(&dest).ok();
        }
        return Err(e);
    }

    record.size = calculate_dir_size(&dest);
    LocalPackageRegistry::save(&record)?;
    Ok(record)
}
