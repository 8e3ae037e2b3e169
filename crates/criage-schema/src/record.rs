//! On-disk install records and repository entries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, Version};

/// The record kept for every installed package.
///
/// Persisted as indented JSON at `<install_path>/.criage/package.json`,
/// next to the files it describes. One record exists per name per scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageInfo {
    /// Package name (identity key within a scope).
    pub name: PackageName,
    /// Installed version.
    pub version: Version,
    /// Short description from the manifest.
    #[serde(default)]
    pub description: String,
    /// Author from the manifest.
    #[serde(default)]
    pub author: String,
    /// When the install completed.
    pub install_date: DateTime<Utc>,
    /// Directory the package was materialized into.
    pub install_path: PathBuf,
    /// `true` for the global scope.
    #[serde(default)]
    pub global: bool,
    /// Declared dependencies (name -> version range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Installed size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Include globs the package was installed with.
    #[serde(default)]
    pub files: Vec<String>,
    /// Named scripts from the manifest.
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl PackageInfo {
    /// Location of the on-disk record for a package installed at `install_path`.
    pub fn record_path_for(install_path: &std::path::Path) -> PathBuf {
        install_path.join(RECORD_DIR).join(RECORD_FILE)
    }

    /// Location of this package's on-disk record.
    pub fn record_path(&self) -> PathBuf {
        Self::record_path_for(&self.install_path)
    }
}

/// Directory inside an install path holding client bookkeeping.
pub const RECORD_DIR: &str = ".criage";

/// File name of the installed-package record.
pub const RECORD_FILE: &str = "package.json";

/// A configured package registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    /// Display name.
    pub name: String,
    /// Base URL; API paths are appended as `{url}/api/v1/...`.
    pub url: String,
    /// Higher values are consulted first.
    #[serde(default)]
    pub priority: i32,
    /// Disabled repositories are skipped entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bearer token sent with authenticated calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Repository {
    /// An enabled repository without credentials.
    pub fn new(name: &str, url: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            priority,
            enabled: true,
            auth_token: None,
        }
    }
}

/// Enabled repositories ordered by descending priority.
///
/// The sort is stable, so repositories with equal priority keep their
/// configured order.
pub fn by_priority(repos: &[Repository]) -> Vec<&Repository> {
    let mut ordered: Vec<&Repository> = repos.iter().filter(|r| r.enabled).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
    ordered
}
