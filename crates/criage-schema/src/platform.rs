//! Target platform identification.
//!
//! Registries publish one file per (OS, architecture) pair using Go-style
//! names (`linux`, `darwin`, `windows` / `amd64`, `arm64`, ...). The client
//! maps the host's `std::env::consts` values onto that vocabulary so the
//! default install target matches what the registry advertises.
//!
//! # Example
//!
//! ```
//! use criage_schema::Platform;
//!
//! let current = Platform::current();
//! println!("Running on: {}", current);
//! ```

use serde::{Deserialize, Serialize};

/// An (OS, architecture) pair in registry naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (`linux`, `darwin`, `windows`, ...).
    pub os: String,
    /// CPU architecture (`amd64`, `arm64`, `386`, ...).
    pub arch: String,
}

impl Platform {
    /// Construct a platform from explicit names.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary is running on.
    pub fn current() -> Self {
        Self::new(current_os(), current_arch())
    }

    /// Use the given values, falling back to the running platform for
    /// whichever one is empty.
    pub fn or_current(os: Option<&str>, arch: Option<&str>) -> Self {
        let os = os.filter(|s| !s.is_empty()).unwrap_or(current_os());
        let arch = arch.filter(|s| !s.is_empty()).unwrap_or(current_arch());
        Self::new(os, arch)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Registry name of the host operating system.
pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Registry name of the host architecture.
pub fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        other => other,
    }
}
