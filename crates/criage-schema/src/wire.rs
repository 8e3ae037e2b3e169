//! Registry wire model.
//!
//! Every registry endpoint answers with the same JSON envelope:
//!
//! ```json
//! { "success": true, "message": "...", "data": { ... }, "error": "..." }
//! ```
//!
//! The envelope is always decoded first. Only when `success` is `true` is the
//! `data` field interpreted, and then directly into the concrete shape the
//! calling operation expects (see [`Payload`]). A shape mismatch is a decode
//! error, never a silently empty value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{PackageName, Version};

/// Generic response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T = serde_json::Value> {
    /// Whether the registry considers the call successful.
    pub success: bool,
    /// Optional human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure reason when `success` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failures interpreting an envelope.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The registry answered `success: false`.
    #[error("API error: {0}")]
    Api(String),

    /// `success: true` but no `data` where a payload was required.
    #[error("response carried no {0} payload")]
    MissingData(&'static str),

    /// `data` did not match the expected shape.
    #[error("unexpected {kind} payload: {source}")]
    Shape {
        /// Which payload was expected.
        kind: &'static str,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ApiResponse<serde_json::Value> {
    /// A successful envelope wrapping `data`.
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            message: None,
            data: serde_json::to_value(data).ok(),
            error: None,
        }
    }

    /// A failed envelope with the given reason.
    pub fn err(reason: &str) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(reason.to_string()),
        }
    }

    /// Fail on `success: false`, otherwise succeed without looking at `data`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Api`] carrying the registry's `error` text.
    pub fn check(&self) -> Result<(), EnvelopeError> {
        if self.success {
            Ok(())
        } else {
            Err(EnvelopeError::Api(
                self.error
                    .clone()
                    .or_else(|| self.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    /// Check the envelope and decode its payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Api`] for `success: false`,
    /// [`EnvelopeError::MissingData`] when `data` is absent or null, and
    /// [`EnvelopeError::Shape`] when it does not match `T`.
    pub fn into_payload<T: Payload>(self) -> Result<T, EnvelopeError> {
        self.check()?;
        match self.data {
            None | Some(serde_json::Value::Null) => Err(EnvelopeError::MissingData(T::KIND)),
            Some(value) => serde_json::from_value(value).map_err(|source| EnvelopeError::Shape {
                kind: T::KIND,
                source,
            }),
        }
    }
}

/// The closed set of payload shapes the registry protocol defines.
///
/// Each operation names the shape it expects; decoding goes straight from
/// the envelope's `data` into that type.
pub trait Payload: DeserializeOwned + private::Sealed {
    /// Short name used in error messages.
    const KIND: &'static str;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::PackageEntry {}
    impl Sealed for super::VersionEntry {}
    impl Sealed for super::SearchData {}
    impl Sealed for super::Statistics {}
    impl Sealed for super::PackageListResponse {}
    impl Sealed for super::ServerInfo {}
}

impl Payload for PackageEntry {
    const KIND: &'static str = "package";
}
impl Payload for VersionEntry {
    const KIND: &'static str = "version";
}
impl Payload for SearchData {
    const KIND: &'static str = "search";
}
impl Payload for Statistics {
    const KIND: &'static str = "statistics";
}
impl Payload for PackageListResponse {
    const KIND: &'static str = "package list";
}
impl Payload for ServerInfo {
    const KIND: &'static str = "server info";
}

/// A package as known to a registry, with every published version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PackageEntry {
    /// Package name.
    pub name: PackageName,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// License identifier.
    #[serde(default)]
    pub license: String,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    /// Source repository URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Published versions, oldest first.
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    /// Latest version as computed by the registry.
    #[serde(rename = "latestVersion", default)]
    pub latest_version: String,
    /// Total download count.
    #[serde(default)]
    pub downloads: u64,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl PackageEntry {
    /// Pick a version: the last published one when `requested` is `None`,
    /// otherwise the first exact string match.
    pub fn select_version(&self, requested: Option<&str>) -> Option<&VersionEntry> {
        match requested.filter(|v| !v.is_empty()) {
            None => self.versions.last(),
            Some(wanted) => self.versions.iter().find(|v| v.version == wanted),
        }
    }
}

/// A single published version of a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VersionEntry {
    /// Version string.
    pub version: Version,
    /// Release notes or description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Runtime dependencies (name -> version range).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies.
    #[serde(
        rename = "devDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Platform-specific archives.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Total size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Checksum of the primary archive.
    #[serde(default)]
    pub checksum: String,
    /// Upload time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<DateTime<Utc>>,
    /// Download count for this version.
    #[serde(default)]
    pub downloads: u64,
}

impl VersionEntry {
    /// First file built for the given OS and architecture.
    pub fn file_for(&self, os: &str, arch: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.os == os && f.arch == arch)
    }
}

/// One downloadable archive for a specific platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileEntry {
    /// Target operating system.
    pub os: String,
    /// Target architecture.
    pub arch: String,
    /// Archive format (`tar.zst`, ...).
    #[serde(default)]
    pub format: String,
    /// File name used in the download path.
    pub filename: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// `sha256:<hex>` checksum.
    #[serde(default)]
    pub checksum: String,
}

/// One hit returned by `/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResult {
    /// Package name.
    pub name: PackageName,
    /// Latest version.
    #[serde(default)]
    pub version: Version,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default)]
    pub author: String,
    /// Download count.
    #[serde(default)]
    pub downloads: u64,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    /// Relevance score, higher is better.
    #[serde(default)]
    pub score: f64,
    /// Repository the hit came from; filled in by the client.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
}

/// Payload of `/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchData {
    /// Matching packages.
    pub results: Vec<SearchResult>,
    /// Total number of matches, when the registry reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Payload of `/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Number of packages hosted.
    #[serde(default)]
    pub total_packages: u64,
    /// Sum of all downloads.
    #[serde(default)]
    pub total_downloads: u64,
    /// Bytes stored.
    #[serde(default)]
    pub total_size: u64,
    /// Last index refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Most downloaded package names.
    #[serde(default)]
    pub popular_packages: Vec<String>,
    /// Number of archives per format.
    #[serde(default)]
    pub formats_count: BTreeMap<String, u64>,
}

/// Payload of `GET /packages?page=&limit=`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageListResponse {
    /// The requested page of packages.
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
    /// Total number of packages.
    #[serde(default)]
    pub total: u64,
    /// Current page (1-based).
    #[serde(default)]
    pub page: u32,
    /// Page size.
    #[serde(default)]
    pub limit: u32,
    /// Number of pages.
    #[serde(default)]
    pub total_pages: u32,
}

/// Payload of `GET /`: free-form server description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct ServerInfo(pub serde_json::Map<String, serde_json::Value>);
