//! Glob-driven file selection and copying.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

/// Include/exclude glob filter over paths relative to a root.
///
/// A path matches a pattern when the pattern matches the path itself or
/// any of its parent directories, so `bin` selects everything below
/// `bin/`. An empty include list selects everything.
#[derive(Debug, Clone)]
pub struct FileSelector {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileSelector {
    /// Compile include and exclude globs. An empty include list selects everything.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, glob::PatternError> {
        let compile = |globs: &[String]| {
            globs
                .iter()
                .filter(|g| !g.is_empty())
                .map(|g| Pattern::new(g.trim_start_matches("./")))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether a path relative to the tree root is selected.
    pub fn is_selected(&self, rel: &Path) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| hits(p, rel));
        included && !self.exclude.iter().any(|p| hits(p, rel))
    }

    /// Every selected regular file or symlink under `root`, as relative
    /// paths in walk order.
    pub fn select(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_dir() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(io::Error::other)?
                .to_path_buf();
            if self.is_selected(&rel) {
                out.push(rel);
            }
        }
        Ok(out)
    }
}

fn hits(pattern: &Pattern, rel: &Path) -> bool {
    rel.ancestors()
        .filter(|a| !a.as_os_str().is_empty())
        .any(|a| pattern.matches_path(a))
}

/// Copy the given relative paths from `src` into `dst`, creating parent
/// directories and preserving permissions.
pub fn copy_files(src: &Path, dst: &Path, files: &[PathBuf]) -> io::Result<()> {
    for rel in files {
        let from = src.join(rel);
        let to = dst.join(rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        let meta = fs::symlink_metadata(&from)?;
        if meta.file_type().is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            // fs::copy carries the permission bits over.
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    if to.symlink_metadata().is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Total size in bytes of regular files under `path`.
pub fn calculate_dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}
