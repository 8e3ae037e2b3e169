//! Installed-package registry.
//!
//! An in-memory map of [`PackageInfo`] records mirrored to one JSON file per
//! package at `<install_path>/.criage/package.json`. Local and global
//! scopes are disjoint: the same name may be installed once in each.
//!
//! Writers persist before publishing and unpublish only after the record is
//! gone, so a reader that sees an entry can rely on its record existing.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use criage_schema::{PackageInfo, PackageName, Version};
use thiserror::Error;
use tracing::debug;

/// Failure persisting an install record.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record could not be written.
    #[error("Failed to write record {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be removed.
    #[error("Failed to delete record {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded.
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

type Key = (bool, PackageName);

/// Installed packages keyed by scope and name, mirrored by `.criage/package.json` records on disk.
#[derive(Debug, Default)]
pub struct LocalPackageRegistry {
    packages: RwLock<BTreeMap<Key, PackageInfo>>,
}

impl LocalPackageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan both install roots, one level deep, for package records.
    ///
    /// Missing roots hold zero packages. Unreadable or malformed records
    /// are skipped.
    pub fn load(local_root: &Path, global_root: &Path) -> Self {
        let mut map = BTreeMap::new();
        scan(local_root, false, &mut map);
        scan(global_root, true, &mut map);
        debug!("Loaded {} installed packages", map.len());
        Self {
            packages: RwLock::new(map),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Key, PackageInfo>> {
        self.packages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Key, PackageInfo>> {
        self.packages.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record for `name` in one scope.
    pub fn get(&self, name: &str, global: bool) -> Option<PackageInfo> {
        self.read().get(&(global, PackageName::new(name))).cloned()
    }

    /// Whether `name` is installed in either scope.
    pub fn contains(&self, name: &str) -> bool {
        let map = self.read();
        [false, true]
            .into_iter()
            .any(|global| map.contains_key(&(global, PackageName::new(name))))
    }

    /// Insert or replace an entry in memory only.
    pub fn put(&self, info: PackageInfo) {
        self.write()
            .insert((info.global, info.name.clone()), info);
    }

    /// Drop an entry from memory only.
    pub fn remove(&self, name: &str, global: bool) -> Option<PackageInfo> {
        self.write().remove(&(global, PackageName::new(name)))
    }

    /// Write the on-disk record, creating `.criage/` as needed.
    pub fn save(info: &PackageInfo) -> Result<(), StoreError> {
        let path = info.record_path();
        let json = serde_json::to_string_pretty(info)?;
        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&path, json).map_err(write_err)
    }

    /// Remove the on-disk record. An already-missing record is not an error.
    pub fn delete_record(info: &PackageInfo) -> Result<(), StoreError> {
        let path = info.record_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete { path, source }),
        }
    }

    /// Persist, then publish.
    pub fn commit(&self, info: PackageInfo) -> Result<(), StoreError> {
        Self::save(&info)?;
        self.put(info);
        Ok(())
    }

    /// Entries of one scope, sorted by name (byte order).
    pub fn snapshot(&self, global: bool) -> Vec<PackageInfo> {
        self.read()
            .iter()
            .filter(|((g, _), _)| *g == global)
            .map(|(_, info)| info.clone())
            .collect()
    }

    /// Entries of one scope, sorted by name.
    ///
    /// With `outdated`, only entries whose `latest` lookup succeeds with a
    /// different version are kept. Lookups run on a snapshot, never under
    /// the lock.
    pub async fn list<F, Fut>(&self, global: bool, outdated: bool, latest: F) -> Vec<PackageInfo>
    where
        F: Fn(PackageName) -> Fut,
        Fut: Future<Output = Option<Version>>,
    {
        let snapshot = self.snapshot(global);
        if !outdated {
            return snapshot;
        }

        let mut out = Vec::new();
        for info in snapshot {
            match latest(info.name.clone()).await {
                Some(v) if v != info.version => out.push(info),
                Some(_) => {}
                None => debug!("Skipping {} in outdated check: lookup failed", info.name),
            }
        }
        out
    }

    /// Number of records across both scopes.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is installed in either scope.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn scan(root: &Path, global: bool, map: &mut BTreeMap<Key, PackageInfo>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        debug!("Install root {} not readable, skipping", root.display());
        return;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let record = PackageInfo::record_path_for(&dir);
        let Ok(content) = std::fs::read_to_string(&record) else {
            continue;
        };
        match serde_json::from_str::<PackageInfo>(&content) {
            Ok(mut info) => {
                // The root decides the scope, whatever the record says.
                info.global = global;
                map.insert((global, info.name.clone()), info);
            }
            Err(e) => debug!("Skipping malformed record {}: {e}", record.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn info(root: &Path, name: &str, version: &str, global: bool) -> PackageInfo {
        PackageInfo {
            name: PackageName::new(name),
            version: Version::new(version),
            description: String::new(),
            author: String::new(),
            install_date: Utc::now(),
            install_path: root.join(name),
            global,
            dependencies: BTreeMap::new(),
            size: 0,
            files: vec!["*".into()],
            scripts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_load_missing_roots() {
        let dir = tempdir().unwrap();
        let reg = LocalPackageRegistry::load(&dir.path().join("a"), &dir.path().join("b"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_load_skips_bad_records() {
        let local = tempdir().unwrap();
        let global = tempdir().unwrap();

        LocalPackageRegistry::save(&info(local.path(), "good", "1.0.0", false)).unwrap();
        LocalPackageRegistry::save(&info(global.path(), "good", "2.0.0", true)).unwrap();

        let bad = local.path().join("bad").join(".criage");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join("package.json"), "{not json").unwrap();
        std::fs::create_dir_all(local.path().join("partial")).unwrap();
        std::fs::write(local.path().join("stray-file"), "x").unwrap();

        let reg = LocalPackageRegistry::load(local.path(), global.path());
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get("good", false).unwrap().version, "1.0.0");
        assert_eq!(reg.get("good", true).unwrap().version, "2.0.0");
        assert!(reg.get("bad", false).is_none());
        assert!(reg.get("partial", false).is_none());
    }

    #[test]
    fn test_commit_writes_record_matching_memory() {
        let root = tempdir().unwrap();
        let reg = LocalPackageRegistry::new();
        let pkg = info(root.path(), "foo", "1.0.0", false);
        reg.commit(pkg.clone()).unwrap();

        let on_disk: PackageInfo =
            serde_json::from_str(&std::fs::read_to_string(pkg.record_path()).unwrap()).unwrap();
        assert_eq!(Some(on_disk), reg.get("foo", false));
        assert!(reg.contains("foo"));
        assert!(reg.get("foo", true).is_none());
    }

    #[test]
    fn test_delete_record_is_idempotent() {
        let root = tempdir().unwrap();
        let pkg = info(root.path(), "foo", "1.0.0", false);
        LocalPackageRegistry::save(&pkg).unwrap();
        LocalPackageRegistry::delete_record(&pkg).unwrap();
        assert!(!pkg.record_path().exists());
        LocalPackageRegistry::delete_record(&pkg).unwrap();
    }

    #[tokio::test]
    async fn test_list_scope_and_order() {
        let root = tempdir().unwrap();
        let reg = LocalPackageRegistry::new();
        for (name, global) in [("b", false), ("A", false), ("a", false), ("g", true)] {
            reg.put(info(root.path(), name, "1.0.0", global));
        }
        let names: Vec<String> = reg
            .list(false, false, |_| async { None })
            .await
            .into_iter()
            .map(|p| p.name.to_string())
            .collect();
        assert_eq!(names, vec!["A", "a", "b"]);

        let global = reg.list(true, false, |_| async { None }).await;
        assert_eq!(global.len(), 1);
    }

    #[tokio::test]
    async fn test_list_outdated() {
        let root = tempdir().unwrap();
        let reg = LocalPackageRegistry::new();
        reg.put(info(root.path(), "current", "1.0.0", false));
        reg.put(info(root.path(), "stale", "1.0.0", false));
        reg.put(info(root.path(), "unknown", "1.0.0", false));

        let outdated = reg
            .list(false, true, |name| async move {
                match name.as_str() {
                    "current" => Some(Version::new("1.0.0")),
                    "stale" => Some(Version::new("1.1.0")),
                    _ => None,
                }
            })
            .await;
        assert_eq!(outdated.len(), 1);
        assert_eq!(outdated[0].name, "stale");
    }

    #[test]
    fn test_readers_never_see_entry_without_record() {
        let root = tempdir().unwrap();
        let reg = Arc::new(LocalPackageRegistry::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(p) = reg.get("foo", false) {
                            assert!(p.record_path().exists());
                        }
                    }
                })
            })
            .collect();

        for i in 0..50 {
            reg.commit(info(root.path(), "foo", &format!("1.0.{i}"), false))
                .unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(reg.get("foo", false).unwrap().version, "1.0.49");
    }
}
