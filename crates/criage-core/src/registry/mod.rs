//! Remote registry protocol (`{base}/api/v1/...`).

mod client;

pub use client::RegistryClient;

use criage_schema::{EnvelopeError, FileEntry, PackageEntry, Repository, VersionEntry};
use thiserror::Error;

use crate::io::download::DownloadError;

/// Errors from talking to a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No enabled repository could serve the package; `reason` is the last failure.
    #[error("Package {name} not found in any repository: {reason}")]
    NotFound { name: String, reason: String },

    /// One repository does not know the package.
    #[error("Package {0} not found in repository")]
    PackageNotFound(String),

    /// The package exists but not at the requested version.
    #[error("Version {version} of {name} not found")]
    VersionNotFound { name: String, version: String },

    /// The version has no file for the requested platform.
    #[error("No file for {platform} in {name} {version}")]
    PlatformNotFound {
        name: String,
        version: String,
        platform: String,
    },

    /// HTTP 401.
    #[error("invalid authorization token")]
    Unauthorized,

    /// Unexpected status with no usable envelope.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The envelope reported `success: false`.
    #[error("API error: {0}")]
    Api(String),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body is not valid JSON.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Downloaded bytes do not match the published checksum.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The envelope is missing data or has the wrong shape.
    #[error("{0}")]
    Envelope(EnvelopeError),
}

impl From<EnvelopeError> for RegistryError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Api(reason) => Self::Api(reason),
            other => Self::Envelope(other),
        }
    }
}

impl From<DownloadError> for RegistryError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Http(e) => Self::Http(e),
            DownloadError::Io(e) => Self::Io(e),
            DownloadError::HashMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
        }
    }
}

/// A package version resolved to a concrete downloadable file.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// Repository the package was found in.
    pub repository: Repository,
    /// Full registry entry.
    pub entry: PackageEntry,
    /// Selected version.
    pub version: VersionEntry,
    /// Selected platform file.
    pub file: FileEntry,
    /// Where to fetch the archive.
    pub download_url: String,
}
