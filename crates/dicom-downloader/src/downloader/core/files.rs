//! File operation utilities
//!
//! Instances are streamed into a `.part` file next to their destination and
//! renamed into place once complete, so a destination path either holds a
//! whole instance or nothing.

use futures::StreamExt;
use reqwest::Response;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::downloader::core::error::describe_transport_error;
use crate::downloader::core::{DownloadError, FileOperation, Result};

/// Make an identifier safe to use as a single path component
///
/// DICOM UIDs are digits and dots, so valid input passes through unchanged.
/// Anything else is replaced so a hostile listing cannot escape the output folder.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Create a temporary file path for an in-flight download
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// Create a directory and all of its parents
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DownloadError::file_system(dir, FileOperation::CreateDir, e))
}

/// Atomically rename a temporary file to its final destination
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp_path, dest_path)
        .await
        .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Move, e))?;
    debug!("Atomically renamed {} to {}", temp_path.display(), dest_path.display());
    Ok(())
}

/// Stream a response body to `dest_path`, returning the number of bytes written
///
/// Body read errors surface as [`DownloadError::InstanceFetch`] for `url`;
/// local I/O errors surface as write errors. The partial file is removed on
/// any failure.
pub async fn write_response_to_file(response: Response, url: &str, dest_path: &Path) -> Result<u64> {
    if let Some(parent) = dest_path.parent() {
        ensure_dir(parent).await?;
    }

    let temp_path = create_temp_path(dest_path);
    let result = stream_into(response, url, &temp_path).await;

    match result {
        Ok(written) => {
            if let Err(e) = atomic_rename(&temp_path, dest_path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}

async fn stream_into(response: Response, url: &str, temp_path: &Path) -> Result<u64> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| DownloadError::file_system(temp_path, FileOperation::Create, e))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::InstanceFetch {
            url: url.to_string(),
            status: None,
            detail: format!("body interrupted: {}", describe_transport_error(&e)),
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::file_system(temp_path, FileOperation::Write, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::file_system(temp_path, FileOperation::Write, e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::file_system(temp_path, FileOperation::Write, e))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_pass_through_unchanged() {
        assert_eq!(sanitize_component("1.2.840.113619.2.55.3"), "1.2.840.113619.2.55.3");
    }

    #[test]
    fn traversal_and_separators_are_neutralised() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_component("  "), "_");
    }

    #[test]
    fn temp_path_appends_part_suffix() {
        let dest = Path::new("/out/1.2.3/4.5.6.dcm");
        assert_eq!(create_temp_path(dest), PathBuf::from("/out/1.2.3/4.5.6.dcm.part"));
    }
}
