//! Archive, download and file-selection helpers.

pub mod archive;
pub mod download;
pub mod files;

pub use archive::{ArchiveError, ArchiveService, CreateArchive, METADATA_ENTRY, TarArchiver};
pub use files::{FileSelector, calculate_dir_size, copy_files};
