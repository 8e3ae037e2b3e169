//! Client configuration and manifest loading.
//!
//! The configuration lives at `$CRIAGE_HOME/config.toml`. A missing file
//! means defaults; keys absent from the file keep their default values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use criage_schema::{
    BuildManifest, CompressionConfig, PackageManifest, Repository, by_priority,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::paths::{self, BUILD_MANIFEST_FILE, MANIFEST_FILE, expand_tilde};

/// Errors from loading, saving or editing configuration and manifests.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or its parent directory could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the expected shape.
    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The in-memory value could not be rendered as TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No `criage.toml` in the given directory.
    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// A dotted key that names no configuration field.
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// A value that does not fit the field's type.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Neither `CRIAGE_HOME` nor a home directory is available.
    #[error("Could not determine home directory. Set CRIAGE_HOME to override.")]
    NoHome,
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root for global installs.
    pub global_path: PathBuf,
    /// Root for project-local installs.
    pub local_path: PathBuf,
    /// Download cache root.
    pub cache_path: PathBuf,
    /// Scratch space for extraction.
    pub temp_path: PathBuf,
    /// Configured registries.
    pub repositories: Vec<Repository>,
    /// Default archive format for `build`.
    pub compression: CompressionConfig,
    /// Reserved for parallel downloads.
    pub parallel: u32,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    /// Reserved; calls are never retried automatically.
    pub retry_count: u32,
    /// Reserved.
    pub auto_update: bool,
    /// Verify sha256 checksums of fresh downloads.
    pub verify_hashes: bool,
    /// Free-form user settings.
    pub settings: BTreeMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_path: PathBuf::from("/usr/local/lib/criage"),
            local_path: PathBuf::from("./criage_modules"),
            cache_path: PathBuf::from("~/.cache/criage"),
            temp_path: std::env::temp_dir().join("criage"),
            repositories: vec![Repository::new("default", "https://packages.criage.io", 100)],
            compression: CompressionConfig::default(),
            parallel: 4,
            timeout: 60,
            retry_count: 3,
            auto_update: false,
            verify_hashes: true,
            settings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from `$CRIAGE_HOME/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = paths::config_path().ok_or(ConfigError::NoHome)?;
        Self::load_from(&path)
    }

    /// Load from an explicit file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write to `$CRIAGE_HOME/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = paths::config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    /// Write to an explicit file, creating its parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }

    /// Install root for a scope.
    pub fn root(&self, global: bool) -> PathBuf {
        expand_tilde(if global {
            &self.global_path
        } else {
            &self.local_path
        })
    }

    /// Directory a package is installed into.
    pub fn install_path(&self, name: &str, global: bool) -> PathBuf {
        self.root(global).join(name)
    }

    /// Cache directory for one package version.
    pub fn cache_path(&self, name: &str, version: &str) -> PathBuf {
        expand_tilde(&self.cache_path).join(name).join(version)
    }

    /// Root of the scratch space.
    pub fn temp_root(&self) -> PathBuf {
        expand_tilde(&self.temp_path)
    }

    /// Enabled repositories, highest priority first.
    pub fn repositories(&self) -> Vec<&Repository> {
        by_priority(&self.repositories)
    }

    /// HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Create the local, cache and temp roots.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [self.root(false), expand_tilde(&self.cache_path), self.temp_root()] {
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Write { path: dir, source })?;
        }
        Ok(())
    }

    /// Load `criage.toml` from `dir`.
    pub fn load_local_manifest(dir: &Path) -> Result<PackageManifest, ConfigError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ConfigError::ManifestNotFound(path));
        }
        read_toml(&path)
    }

    /// Load `criage-build.toml` from `dir`, `None` when absent.
    pub fn load_build_manifest(dir: &Path) -> Result<Option<BuildManifest>, ConfigError> {
        let path = dir.join(BUILD_MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_toml(&path).map(Some)
    }

    /// Read a single value by dotted key (`compression.level`,
    /// `repositories.0.url`, `settings.editor`).
    pub fn get_value(&self, key: &str) -> Result<String, ConfigError> {
        let mut root = toml::Value::try_from(self)?;
        lookup_mut(&mut root, key)
            .map(|v| render(v))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Set a value by dotted key.
    ///
    /// The raw string is coerced to the type the key already has. Unknown
    /// keys are rejected, except under `settings.` where new entries are
    /// created.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let mut root = toml::Value::try_from(&*self)?;

        if let Some(slot) = lookup_mut(&mut root, key) {
            *slot = coerce(key, slot, raw)?;
        } else if let Some(name) = key.strip_prefix("settings.").filter(|n| !n.contains('.')) {
            if let toml::Value::Table(table) = &mut root {
                let settings = table
                    .entry("settings")
                    .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                if let toml::Value::Table(settings) = settings {
                    settings.insert(name.to_string(), infer(raw));
                }
            }
        } else {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        *self = root
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Every scalar setting as `(dotted key, value)`, in file order.
    pub fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let root = toml::Value::try_from(self)?;
        let mut out = Vec::new();
        flatten("", &root, &mut out);
        Ok(out)
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn lookup_mut<'a>(mut value: &'a mut toml::Value, key: &str) -> Option<&'a mut toml::Value> {
    for part in key.split('.') {
        value = match value {
            toml::Value::Table(t) => t.get_mut(part)?,
            toml::Value::Array(a) => a.get_mut(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn render(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce(key: &str, existing: &toml::Value, raw: &str) -> Result<toml::Value, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    match existing {
        toml::Value::String(_) => Ok(toml::Value::String(raw.to_string())),
        toml::Value::Integer(_) => raw
            .parse()
            .map(toml::Value::Integer)
            .map_err(|_| invalid("expected an integer")),
        toml::Value::Float(_) => raw
            .parse()
            .map(toml::Value::Float)
            .map_err(|_| invalid("expected a number")),
        toml::Value::Boolean(_) => raw
            .parse()
            .map(toml::Value::Boolean)
            .map_err(|_| invalid("expected true or false")),
        _ => Err(invalid("not a scalar setting")),
    }
}

fn infer(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(raw.to_string())
    }
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    let join = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}.{k}")
        }
    };
    match value {
        toml::Value::Table(t) => {
            for (k, v) in t {
                flatten(&join(k), v, out);
            }
        }
        toml::Value::Array(a) if a.iter().any(toml::Value::is_table) => {
            for (i, v) in a.iter().enumerate() {
                flatten(&join(&i.to_string()), v, out);
            }
        }
        other => out.push((prefix.to_string(), render(other))),
    }
}
