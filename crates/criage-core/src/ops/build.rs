//! Authoring operations: scaffold, build, publish, inspect.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Utc;
use criage_schema::{
    ArchiveFormat, BuildManifest, BuildTarget, COMPRESSION_NORMAL, CompressionConfig,
    PackageManifest, PackageMetadata, PackageName, Platform, Repository, Version,
};
use tokio::process::Command;
use tracing::{debug, info};

use super::{OpsError, PackageManager};
use crate::config::Config;
use crate::io::CreateArchive;
use crate::paths::MANIFEST_FILE;

/// Default build script when the source tree has no build manifest.
const DEFAULT_BUILD_SCRIPT: &str = "make";

/// Inputs for [`PackageManager::build`](super::PackageManager::build).
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Directory holding `criage.toml`.
    pub source_dir: PathBuf,
    /// Archive path; relative paths are taken from `source_dir`.
    /// Defaults to `<name>-<version>.criage`.
    pub output: Option<PathBuf>,
    /// Archive format; defaults to the configured compression format.
    pub format: Option<ArchiveFormat>,
    /// Compression level; defaults to the configured level.
    pub level: Option<i32>,
}

/// A freshly built archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Archive size in bytes.
    pub size: u64,
    /// Format actually used.
    pub format: ArchiveFormat,
}

/// Inputs for [`PackageManager::publish`](super::PackageManager::publish).
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Directory holding `criage.toml`.
    pub source_dir: PathBuf,
    /// Registry base URL; the highest-priority repository when unset.
    pub registry_url: Option<String>,
    /// Bearer token; the target repository's token when unset.
    pub token: Option<String>,
}

fn synthesize_build_manifest(manifest: &PackageManifest, compression: CompressionConfig) -> BuildManifest {
    let platform = Platform::current();
    BuildManifest {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        build_script: DEFAULT_BUILD_SCRIPT.to_string(),
        output_dir: "./build".to_string(),
        include_files: manifest.files.clone(),
        exclude_files: manifest.exclude.clone(),
        compression,
        targets: vec![BuildTarget {
            os: platform.os,
            arch: platform.arch,
        }],
        ..BuildManifest::default()
    }
}

async fn run_build_script(build: &BuildManifest, source_dir: &Path) -> Result<(), OpsError> {
    info!("Running build script: {}", build.build_script);
    let status = Command::new("sh")
        .arg("-c")
        .arg(&build.build_script)
        .envs(&build.build_env)
        .current_dir(source_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;
    if !status.success() {
        return Err(OpsError::BuildScript(status.to_string()));
    }
    Ok(())
}

impl PackageManager {
    /// Run the build script and pack the source tree into an archive
    /// carrying its manifests as embedded metadata.
    pub async fn build(&self, req: &BuildRequest) -> Result<BuildOutput, OpsError> {
        let manifest = Config::load_local_manifest(&req.source_dir)?;

        let format = match req.format {
            Some(f) => f,
            None => self
                .config
                .compression
                .format
                .parse::<ArchiveFormat>()
                .map_err(|e| OpsError::context("invalid compression format in config", e))?,
        };
        let level = req.level.unwrap_or(self.config.compression.level);

        let build = match Config::load_build_manifest(&req.source_dir)? {
            Some(b) => b,
            None => {
                debug!("No build manifest in {}, using defaults", req.source_dir.display());
                let compression = CompressionConfig {
                    format: format.to_string(),
                    level,
                };
                synthesize_build_manifest(&manifest, compression)
            }
        };

        self.reporter
            .section(&format!("Building {} {}", manifest.name, manifest.version));
        if !build.build_script.is_empty() {
            run_build_script(&build, &req.source_dir).await?;
        }

        let output = match &req.output {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => req.source_dir.join(p),
            None => req
                .source_dir
                .join(format!("{}-{}.criage", manifest.name, manifest.version)),
        };

        let metadata = PackageMetadata {
            package_manifest: Some(manifest.clone()),
            build_manifest: Some(build.clone()),
            compression_type: format.to_string(),
            created_at: Some(Utc::now()),
            created_by: "criage".to_string(),
        };

        let archiver = self.archiver.clone();
        let (source_dir, out) = (req.source_dir.clone(), output.clone());
        let size = tokio::task::spawn_blocking(move || {
            archiver.create_with_metadata(&CreateArchive {
                source_dir: &source_dir,
                output: &out,
                format,
                level,
                include: &build.include_files,
                exclude: &build.exclude_files,
                metadata: &metadata,
            })
        })
        .await??;

        info!("Built {} ({size} bytes)", output.display());
        self.reporter.done(&manifest.name, &manifest.version, "built", Some(size));
        Ok(BuildOutput {
            path: output,
            size,
            format,
        })
    }

    /// Build a `tar.zst` of the source tree and upload it. The temporary
    /// archive is removed whatever the outcome.
    pub async fn publish(&self, req: &PublishRequest) -> Result<(PackageName, Version), OpsError> {
        let manifest = Config::load_local_manifest(&req.source_dir)?;

        let mut target = match req.registry_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Repository::new("publish", url, 0),
            None => self.repository(None)?,
        };
        if let Some(token) = req.token.as_deref().filter(|t| !t.is_empty()) {
            target.auth_token = Some(token.to_string());
        }

        let temp_root = self.config.temp_root();
        tokio::fs::create_dir_all(&temp_root).await?;
        let archive = temp_root.join(format!("{}-{}.tar.zst", manifest.name, manifest.version));

        let result = async {
            self.build(&BuildRequest {
                source_dir: req.source_dir.clone(),
                output: Some(archive.clone()),
                format: Some(ArchiveFormat::TarZst),
                level: Some(COMPRESSION_NORMAL),
            })
            .await?;
            self.reporter
                .info(&format!("Uploading {} {} to {}", manifest.name, manifest.version, target.url));
            self.registry.upload(&target, &archive).await?;
            Ok::<_, OpsError>(())
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            debug!("Failed to remove {}: {e}", archive.display());
        }
        result?;

        self.reporter
            .success(&format!("Published {} {}", manifest.name, manifest.version));
        Ok((manifest.name, manifest.version))
    }

    /// Scaffold a new package directory under `parent`.
    pub fn create_package(
        &self,
        parent: &Path,
        name: &str,
        author: &str,
        description: &str,
    ) -> Result<PathBuf, OpsError> {
        let root = parent.join(name);
        let manifest_path = root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(OpsError::context(
                "package already exists",
                manifest_path.display(),
            ));
        }

        let manifest = PackageManifest {
            name: PackageName::new(name),
            version: Version::new("1.0.0"),
            description: description.to_string(),
            author: author.to_string(),
            license: "MIT".to_string(),
            files: vec!["*".to_string()],
            exclude: [".git", "node_modules", "*.log"].map(String::from).to_vec(),
            arch: ["amd64", "arm64"].map(String::from).to_vec(),
            os: ["linux", "darwin", "windows"].map(String::from).to_vec(),
            min_version: "1.0.0".to_string(),
            ..PackageManifest::default()
        };
        let toml = toml::to_string_pretty(&manifest)
            .map_err(|e| OpsError::context("failed to serialize manifest", e))?;

        std::fs::create_dir_all(&root)?;
        std::fs::write(&manifest_path, toml)?;
        let readme = format!(
            "# {name}\n\n{description}\n\n## Installation\n\n```bash\ncriage install {name}\n```\n"
        );
        std::fs::write(root.join("README.md"), readme)?;
        for dir in ["src", "bin", "docs"] {
            std::fs::create_dir_all(root.join(dir))?;
        }

        info!("Created package {name} at {}", root.display());
        Ok(root)
    }

    /// Read the metadata embedded in a built archive.
    pub async fn archive_metadata(&self, path: &Path) -> Result<PackageMetadata, OpsError> {
        let archiver = self.archiver.clone();
        let path = path.to_path_buf();
        let meta = tokio::task::spawn_blocking(move || {
            let format = archiver.detect_format(&path)?;
            archiver.extract_metadata(&path, format)
        })
        .await??;
        Ok(meta)
    }
}
