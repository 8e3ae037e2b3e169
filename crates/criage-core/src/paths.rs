//! Well-known locations and file names.

use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Package manifest file name.
pub const MANIFEST_FILE: &str = "criage.toml";

/// Build manifest file name.
pub const BUILD_MANIFEST_FILE: &str = "criage-build.toml";

/// Client configuration file name inside the criage home.
pub const CONFIG_FILE: &str = "config.toml";

/// Returns the criage home directory (`$CRIAGE_HOME`, else `~/.criage`),
/// or None if the user's home cannot be resolved.
pub fn try_criage_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("CRIAGE_HOME") {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".criage"))
}

/// Config file path: ~/.criage/config.toml
pub fn config_path() -> Option<PathBuf> {
    try_criage_home().map(|h| h.join(CONFIG_FILE))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
