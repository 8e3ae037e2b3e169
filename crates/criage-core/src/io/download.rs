//! Streaming download to disk with SHA256 verification.

use std::path::{Path, PathBuf};

use criage_schema::Sha256Digest;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Failure while streaming a download to disk.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure while writing `dest`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The body does not hash to the published checksum.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Stream a response body into `dest`.
///
/// Bytes land in a `.part` file next to `dest` which is renamed into place
/// only once the body is complete (and, when `expected` is given, its
/// digest matches), so an interrupted download never looks like a cached
/// archive. Returns the hex SHA256 of the body.
pub async fn stream_to_file(
    response: reqwest::Response,
    dest: &Path,
    expected: Option<&Sha256Digest>,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<String, DownloadError> {
    let total = response.content_length();
    let part = part_path(dest);

    let result = async {
        let mut file = File::create(&part).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        on_progress(0, total);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }
        file.flush().await?;
        Ok::<_, DownloadError>(hex::encode(hasher.finalize()))
    }
    .await;

    let actual = match result {
        Ok(actual) => actual,
        Err(e) => {
            tokio::fs::remove_file(&part).await.ok();
            return Err(e);
        }
    };

    if let Some(expected) = expected {
        if !expected.matches(&actual) {
            tokio::fs::remove_file(&part).await.ok();
            return Err(DownloadError::HashMismatch {
                expected: expected.as_str().to_string(),
                actual,
            });
        }
    }

    tokio::fs::rename(&part, dest).await?;
    Ok(actual)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
