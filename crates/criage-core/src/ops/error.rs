//! Domain-specific errors for package operations

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::hooks::HookError;
use crate::io::ArchiveError;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// Errors from package lifecycle operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// No record for the package in the requested scope.
    #[error("Package {0} is not installed")]
    NotInstalled(String),

    /// A package tree without `criage.toml`.
    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Dependency chain that leads back to itself, e.g. `a -> b -> a`.
    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    /// A repository target that matches nothing configured.
    #[error("Unknown repository: {0}")]
    UnknownRepository(String),

    /// The build script exited non-zero.
    #[error("Build script failed with {0}")]
    BuildScript(String),

    /// Registry lookup, download or upload failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Archive packing or unpacking failure.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Configuration or manifest failure.
    #[error("Config error: {0}")]
    Config(ConfigError),

    /// A terminal lifecycle hook failure.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Install record could not be persisted.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failed install step, naming the package.
    #[error("Failed to {step} {name}: {source}")]
    Install {
        name: String,
        step: &'static str,
        #[source]
        source: Box<OpsError>,
    },

    /// Any other failure with a short description of what was attempted.
    #[error("{context}: {message}")]
    Context {
        context: &'static str,
        message: String,
    },
}

impl OpsError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }

    /// Wraps an error raised while installing `name`, naming the failed step.
    ///
    /// ```
    /// use criage_core::OpsError;
    ///
    /// let err = std::io::Error::other("disk full");
    /// let err = OpsError::during("extract", "jq")(err);
    /// assert_eq!(err.to_string(), "Failed to extract jq: IO error: disk full");
    /// ```
    pub fn during<E: Into<OpsError>>(step: &'static str, name: &str) -> impl FnOnce(E) -> OpsError + use<E> {
        let name = name.to_string();
        move |err| Self::Install {
            name,
            step,
            source: Box::new(err.into()),
        }
    }

    /// The innermost error once install steps are unwrapped.
    pub fn root_cause(&self) -> &OpsError {
        match self {
            Self::Install { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<ConfigError> for OpsError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ManifestNotFound(path) => Self::ManifestNotFound(path),
            other => Self::Config(other),
        }
    }
}

impl From<tokio::task::JoinError> for OpsError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::context("background task", err)
    }
}
