//! Client library for the criage package manager: registry protocol,
//! installed-package store, archives, hooks and the lifecycle operations
//! that tie them together.

pub mod config;
pub mod hooks;
pub mod io;
pub mod ops;
pub mod paths;
pub mod rate_limit;
pub mod registry;
pub mod reporter;
pub mod store;

pub use config::Config;
pub use ops::{OpsError, PackageManager};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("criage/", env!("CARGO_PKG_VERSION"));
