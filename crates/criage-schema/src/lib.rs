//! Shared data model for the criage package manager.
//!
//! Everything that crosses a boundary lives here: the registry wire
//! envelope and payloads, the installed-package record, package and build
//! manifests, and the small newtypes used to name packages, versions and
//! platforms. This crate performs no I/O.

pub mod checksum;
pub mod manifest;
pub mod platform;
pub mod record;
pub mod types;
pub mod wire;

pub use checksum::Sha256Digest;
pub use manifest::{
    BuildManifest, BuildTarget, COMPRESSION_BEST, COMPRESSION_FAST, COMPRESSION_NORMAL,
    CompressionConfig, HookPoint, PackageHooks, PackageManifest, PackageMetadata,
};
pub use platform::Platform;
pub use record::{PackageInfo, Repository, by_priority};
pub use types::{ArchiveFormat, PackageName, Version};
pub use wire::{
    ApiResponse, EnvelopeError, FileEntry, PackageEntry, PackageListResponse, Payload,
    SearchData, SearchResult, ServerInfo, Statistics, VersionEntry,
};
