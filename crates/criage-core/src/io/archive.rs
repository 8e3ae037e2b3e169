//! Archive creation and extraction
//!
//! Handles tar.zst, tar.gz, tar and zip. Built archives carry their
//! [`PackageMetadata`] as a JSON entry at the archive root.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use criage_schema::{ArchiveFormat, PackageMetadata};
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

use super::files::FileSelector;

/// Archive entry holding the embedded metadata.
pub const METADATA_ENTRY: &str = "criage-metadata.json";

/// Errors from packing, unpacking or inspecting archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Neither the magic bytes nor the extension identify a format.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// The archive library rejected the data.
    #[error("Archive error: {0}")]
    Archive(String),

    /// An include or exclude glob does not compile.
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The archive has no metadata entry.
    #[error("No embedded metadata in {0}")]
    MetadataNotFound(PathBuf),

    /// The metadata entry is not valid JSON.
    #[error("Invalid embedded metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Inputs for [`ArchiveService::create_with_metadata`].
#[derive(Debug)]
pub struct CreateArchive<'a> {
    /// Tree to pack.
    pub source_dir: &'a Path,
    /// Archive file to write.
    pub output: &'a Path,
    /// Archive format to write.
    pub format: ArchiveFormat,
    /// Compression level; ignored for plain tar.
    pub level: i32,
    /// Globs to include; empty means everything.
    pub include: &'a [String],
    /// Globs to leave out.
    pub exclude: &'a [String],
    /// Stored as the metadata entry.
    pub metadata: &'a PackageMetadata,
}

/// Packing and unpacking of package archives.
///
/// All methods block; async callers run them on the blocking pool.
pub trait ArchiveService: Send + Sync + std::fmt::Debug {
    /// Identify the container format of an archive on disk.
    fn detect_format(&self, path: &Path) -> Result<ArchiveFormat, ArchiveError>;

    /// Unpack `archive` into `dest`. Returns the number of files written.
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        format: ArchiveFormat,
    ) -> Result<usize, ArchiveError>;

    /// Pack the selected files of a directory plus embedded metadata.
    /// Returns the size of the written archive.
    fn create_with_metadata(&self, req: &CreateArchive<'_>) -> Result<u64, ArchiveError>;

    /// Read the embedded metadata without unpacking.
    fn extract_metadata(
        &self,
        archive: &Path,
        format: ArchiveFormat,
    ) -> Result<PackageMetadata, ArchiveError>;
}

/// Default [`ArchiveService`] backed by `tar`, `zstd`, `flate2` and `zip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiver;

impl ArchiveService for TarArchiver {
    fn detect_format(&self, path: &Path) -> Result<ArchiveFormat, ArchiveError> {
        if let Some(format) = format_from_extension(path) {
            return Ok(format);
        }
        sniff_format(path)
    }

    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        format: ArchiveFormat,
    ) -> Result<usize, ArchiveError> {
        debug!("Extracting {} ({format}) to {}", archive.display(), dest.display());
        match format {
            ArchiveFormat::TarZst => {
                let reader = BufReader::new(File::open(archive)?);
                extract_tar(ZstdDecoder::new(reader)?, dest)
            }
            ArchiveFormat::TarGz => {
                let reader = BufReader::new(File::open(archive)?);
                extract_tar(flate2::read::GzDecoder::new(reader), dest)
            }
            ArchiveFormat::Tar => extract_tar(BufReader::new(File::open(archive)?), dest),
            ArchiveFormat::Zip => extract_zip(archive, dest),
        }
    }

    fn create_with_metadata(&self, req: &CreateArchive<'_>) -> Result<u64, ArchiveError> {
        let selector = FileSelector::new(req.include, req.exclude)?;
        let output_dir = req
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let output_abs = fs::canonicalize(output_dir)
            .ok()
            .zip(req.output.file_name())
            .map(|(dir, name)| dir.join(name));
        let root_abs = fs::canonicalize(req.source_dir)?;

        let files: Vec<PathBuf> = selector
            .select(req.source_dir)?
            .into_iter()
            .filter(|rel| rel.as_os_str() != METADATA_ENTRY)
            // Never pack the archive being written.
            .filter(|rel| output_abs.as_deref() != Some(root_abs.join(rel).as_path()))
            .collect();
        let meta_json = serde_json::to_vec_pretty(req.metadata)?;

        debug!(
            "Creating {} archive {} with {} files",
            req.format,
            req.output.display(),
            files.len()
        );

        let out = BufWriter::new(File::create(req.output)?);
        match req.format {
            ArchiveFormat::TarZst => {
                let encoder = zstd::stream::Encoder::new(out, req.level)?;
                write_tar(encoder, req.source_dir, &files, &meta_json)?
                    .finish()?
                    .flush()?;
            }
            ArchiveFormat::TarGz => {
                let level = flate2::Compression::new(req.level.clamp(0, 9) as u32);
                let encoder = flate2::write::GzEncoder::new(out, level);
                write_tar(encoder, req.source_dir, &files, &meta_json)?
                    .finish()?
                    .flush()?;
            }
            ArchiveFormat::Tar => {
                write_tar(out, req.source_dir, &files, &meta_json)?.flush()?;
            }
            ArchiveFormat::Zip => {
                write_zip(out, req.source_dir, &files, &meta_json, req.level)?;
            }
        }

        Ok(fs::metadata(req.output)?.len())
    }

    fn extract_metadata(
        &self,
        archive: &Path,
        format: ArchiveFormat,
    ) -> Result<PackageMetadata, ArchiveError> {
        let raw = match format {
            ArchiveFormat::TarZst => {
                let reader = BufReader::new(File::open(archive)?);
                read_tar_entry(ZstdDecoder::new(reader)?, METADATA_ENTRY)?
            }
            ArchiveFormat::TarGz => {
                let reader = BufReader::new(File::open(archive)?);
                read_tar_entry(flate2::read::GzDecoder::new(reader), METADATA_ENTRY)?
            }
            ArchiveFormat::Tar => {
                read_tar_entry(BufReader::new(File::open(archive)?), METADATA_ENTRY)?
            }
            ArchiveFormat::Zip => read_zip_entry(archive, METADATA_ENTRY)?,
        };
        let raw = raw.ok_or_else(|| ArchiveError::MetadataNotFound(archive.to_path_buf()))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Detect archive format from file extension
fn format_from_extension(path: &Path) -> Option<ArchiveFormat> {
    let path_str = path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".tar.zst") || path_str.ends_with(".tzst") {
        Some(ArchiveFormat::TarZst)
    } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if path_str.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else if path_str.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else {
        None
    }
}

/// Detect archive format from magic bytes (for `.criage` and other
/// extensionless outputs).
fn sniff_format(path: &Path) -> Result<ArchiveFormat, ArchiveError> {
    let mut head = [0u8; 512];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let head = &head[..filled];

    if head.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
        Ok(ArchiveFormat::TarZst)
    } else if head.starts_with(&[0x1F, 0x8B]) {
        Ok(ArchiveFormat::TarGz)
    } else if head.starts_with(b"PK\x03\x04") {
        Ok(ArchiveFormat::Zip)
    } else if head.len() >= 262 && &head[257..262] == b"ustar" {
        Ok(ArchiveFormat::Tar)
    } else {
        Err(ArchiveError::UnsupportedFormat(path.display().to_string()))
    }
}

/// Entry path reduced to its normal components; `None` for paths that
/// would escape the destination.
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ArchiveError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        let relative_path = sanitize(&entry_path).ok_or_else(|| {
            ArchiveError::Archive(format!("Invalid path in archive: {}", entry_path.display()))
        })?;
        if relative_path.as_os_str().is_empty() || relative_path.as_os_str() == METADATA_ENTRY {
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&absolute_path)?;
        count += 1;
    }

    Ok(count)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ArchiveError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            continue;
        };
        if relative_path.as_os_str() == METADATA_ENTRY {
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }
        count += 1;
    }

    Ok(count)
}

fn write_tar<W: Write>(
    writer: W,
    root: &Path,
    files: &[PathBuf],
    meta_json: &[u8],
) -> Result<W, ArchiveError> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for rel in files {
        builder.append_path_with_name(root.join(rel), rel)?;
    }

    let mut header = tar::Header::new_gnu();
    header.set_size(meta_json.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, METADATA_ENTRY, meta_json)?;

    Ok(builder.into_inner()?)
}

fn write_zip<W: Write + io::Seek>(
    writer: W,
    root: &Path,
    files: &[PathBuf],
    meta_json: &[u8],
    level: i32,
) -> Result<(), ArchiveError> {
    use zip::write::SimpleFileOptions;

    let zip_err = |e: zip::result::ZipError| ArchiveError::Archive(e.to_string());
    let mut zip = zip::ZipWriter::new(writer);
    let base = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(i64::from(level.clamp(0, 9))));

    for rel in files {
        let abs = root.join(rel);
        let name = rel.to_string_lossy().replace('\\', "/");
        let mut options = base.clone();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(fs::metadata(&abs)?.permissions().mode());
        }
        zip.start_file(name, options).map_err(zip_err)?;
        io::copy(&mut File::open(&abs)?, &mut zip)?;
    }

    zip.start_file(METADATA_ENTRY, base.unix_permissions(0o644))
        .map_err(zip_err)?;
    zip.write_all(meta_json)?;
    zip.finish().map_err(zip_err)?.flush()?;
    Ok(())
}

fn read_tar_entry<R: Read>(reader: R, wanted: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if sanitize(&path).is_some_and(|p| p.as_os_str() == wanted) {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            return Ok(Some(buf));
        }
    }
    Ok(None)
}

fn read_zip_entry(archive_path: &Path, wanted: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)
        .map_err(|e| ArchiveError::Archive(e.to_string()))?;
    let result = match archive.by_name(wanted) {
        Ok(mut file) => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Some(buf)
        }
        Err(zip::result::ZipError::FileNotFound) => None,
        Err(e) => return Err(ArchiveError::Archive(e.to_string())),
    };
    Ok(result)
}
