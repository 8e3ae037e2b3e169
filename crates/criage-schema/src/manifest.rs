//! Package and build manifests.
//!
//! A package manifest (`criage.toml`) describes what a package is and how
//! it installs; a build manifest (`criage-build.toml`) describes how an
//! author turns a source tree into a publishable archive. Both travel
//! inside built archives as [`PackageMetadata`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, Version};

/// Declarative package description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PackageManifest {
    /// Package name.
    pub name: PackageName,
    /// Package version.
    pub version: Version,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// License identifier.
    #[serde(default)]
    pub license: String,
    /// Homepage URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    /// Source repository URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Runtime dependencies (name -> version range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Dependencies only installed with `--dev`.
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Named scripts.
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    /// Include globs, relative to the package root.
    #[serde(default = "default_files")]
    pub files: Vec<String>,
    /// Exclude globs used when building.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Supported architectures.
    #[serde(default)]
    pub arch: Vec<String>,
    /// Supported operating systems.
    #[serde(default)]
    pub os: Vec<String>,
    /// Minimum client version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_version: String,
    /// Lifecycle hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<PackageHooks>,
    /// Free-form extra metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_files() -> Vec<String> {
    vec!["*".to_string()]
}

impl PackageManifest {
    /// Runtime dependencies, plus dev dependencies when `dev` is set.
    /// Runtime entries win on a name clash.
    pub fn effective_dependencies(&self, dev: bool) -> BTreeMap<String, String> {
        let mut deps = BTreeMap::new();
        if dev {
            deps.extend(self.dev_dependencies.clone());
        }
        deps.extend(self.dependencies.clone());
        deps
    }

    /// Hook commands for one lifecycle point; empty when no hooks are set.
    pub fn hooks_for(&self, point: HookPoint) -> &[String] {
        self.hooks.as_ref().map_or(&[], |h| h.commands(point))
    }
}

/// Shell commands run at defined lifecycle points, in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PackageHooks {
    /// Before files are copied into the install path (cwd: extraction dir).
    #[serde(default)]
    pub pre_install: Vec<String>,
    /// After the install is recorded (cwd: install path).
    #[serde(default)]
    pub post_install: Vec<String>,
    /// Before the install directory is deleted.
    #[serde(default)]
    pub pre_remove: Vec<String>,
    /// After the package is gone.
    #[serde(default)]
    pub post_remove: Vec<String>,
}

/// A lifecycle point at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// See [`PackageHooks::pre_install`].
    PreInstall,
    /// See [`PackageHooks::post_install`].
    PostInstall,
    /// See [`PackageHooks::pre_remove`].
    PreRemove,
    /// See [`PackageHooks::post_remove`].
    PostRemove,
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PreInstall => "pre-install",
            Self::PostInstall => "post-install",
            Self::PreRemove => "pre-remove",
            Self::PostRemove => "post-remove",
        })
    }
}

impl PackageHooks {
    /// Commands registered for `point`.
    pub fn commands(&self, point: HookPoint) -> &[String] {
        match point {
            HookPoint::PreInstall => &self.pre_install,
            HookPoint::PostInstall => &self.post_install,
            HookPoint::PreRemove => &self.pre_remove,
            HookPoint::PostRemove => &self.post_remove,
        }
    }
}

/// How to build a publishable archive from a source tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BuildManifest {
    /// Package name.
    pub name: PackageName,
    /// Package version.
    pub version: Version,
    /// Shell command run before archiving; empty to skip.
    #[serde(default)]
    pub build_script: String,
    /// Extra environment for the build script.
    #[serde(default)]
    pub build_env: BTreeMap<String, String>,
    /// Where the build script leaves its output.
    #[serde(default)]
    pub output_dir: String,
    /// Include globs for the archive.
    #[serde(default)]
    pub include_files: Vec<String>,
    /// Exclude globs for the archive.
    #[serde(default)]
    pub exclude_files: Vec<String>,
    /// Archive format and level.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Platforms this build produces.
    #[serde(default)]
    pub targets: Vec<BuildTarget>,
}

/// One (OS, architecture) a build targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildTarget {
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
}

/// Archive format and compression level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Format name (`tar.zst`, `tar.gz`, `zip`, ...).
    pub format: String,
    /// Compression level.
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            format: "tar.zst".to_string(),
            level: COMPRESSION_NORMAL,
        }
    }
}

/// Fastest compression level.
pub const COMPRESSION_FAST: i32 = 1;
/// Default compression level.
pub const COMPRESSION_NORMAL: i32 = 3;
/// Smallest output.
pub const COMPRESSION_BEST: i32 = 9;

/// Metadata embedded into every built archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PackageMetadata {
    /// The package manifest at build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manifest: Option<PackageManifest>,
    /// The build manifest used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_manifest: Option<BuildManifest>,
    /// Archive format name.
    #[serde(default)]
    pub compression_type: String,
    /// Build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Tool that produced the archive.
    #[serde(default)]
    pub created_by: String,
}
