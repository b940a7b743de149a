//! Blob quickstart sequence
//!
//! Create a container, upload a sample file, list the container, download
//! the blob, wait for confirmation and clean up. Progress goes to `out`.

use crate::blob::{BlobBackend, BlobManager, DownloadOptions, UploadOptions};
use crate::config::Config;
use crate::error::Result;
use crate::utils::helpers::{random_string, unique_container_name};
use crate::workflow::handle_errors;
use futures::TryStreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Contents of the local sample file
pub const SAMPLE_DATA: &[u8] = b"Hello World\nthis is a blob\n";

#[derive(Debug, Clone)]
pub struct BlobWorkflowOptions {
    pub container_prefix: String,
    /// Directory the sample file is written to
    pub work_dir: PathBuf,
    pub upload: UploadOptions,
    pub download: DownloadOptions,
    /// Skip waiting for Enter before cleanup
    pub assume_yes: bool,
}

impl BlobWorkflowOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            container_prefix: config.blob.container_prefix.clone(),
            work_dir: config
                .blob
                .work_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            upload: UploadOptions {
                block_size: config.blob.block_size(),
                parallelism: config.blob.max_concurrent_uploads,
                max_single_put_size: config.blob.max_single_put_size(),
                content_type: None,
            },
            download: DownloadOptions {
                retry: crate::utils::retry::RetryOptions {
                    max_retries: config.blob.download_retries,
                    ..config.retry.clone()
                },
            },
            assume_yes: false,
        }
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobQuickstartReport {
    pub container_name: String,
    pub blob_name: String,
    pub listed: Vec<String>,
    pub downloaded: Vec<u8>,
}

pub async fn run_blob_quickstart<W, R>(
    backend: Arc<dyn BlobBackend>,
    options: &BlobWorkflowOptions,
    out: &mut W,
    input: &mut R,
) -> Result<BlobQuickstartReport>
where
    W: Write + ?Sized,
    R: AsyncBufRead + Unpin + ?Sized,
{
    writeln!(out, "Azure blob storage quick start sample")?;

    let container_name = unique_container_name(&options.container_prefix)?;
    writeln!(out, "containerName: {}", container_name)?;
    let manager = BlobManager::new(backend, container_name.clone());

    writeln!(out, "Creating a container named {}", container_name)?;
    handle_errors(manager.create_container().await, out)?;

    writeln!(out, "Creating a dummy file to test the upload and download")?;
    let blob_name = random_string();
    let file_path = options.work_dir.join(&blob_name);
    write_sample_file(&file_path).await?;

    writeln!(out, "Uploading the file with blob name: {}", blob_name)?;
    let report = manager
        .upload_file(&file_path, &blob_name, &options.upload)
        .await?;
    info!(blob = %report.blob_name, size = report.size, blocks = report.blocks, "upload complete");

    let mut listed = Vec::new();
    let mut blobs = manager.list_blobs_stream();
    while let Some(item) = blobs.try_next().await? {
        writeln!(out, "Blob name: {}", item.name)?;
        listed.push(item.name);
    }

    let downloaded = manager.download_blob(&blob_name, &options.download).await?;
    write!(out, "Downloaded the blob: {}", String::from_utf8_lossy(&downloaded))?;

    writeln!(
        out,
        "Press enter key to delete the sample files, example container, and exit the application. "
    )?;
    out.flush()?;
    if !options.assume_yes {
        let mut line = String::new();
        if let Err(e) = input.read_line(&mut line).await {
            warn!("Failed to read confirmation: {}", e);
        }
    }

    writeln!(out, "Cleaning up.")?;
    cleanup(&manager, &file_path).await;

    Ok(BlobQuickstartReport {
        container_name,
        blob_name,
        listed,
        downloaded,
    })
}

async fn write_sample_file(path: &Path) -> Result<()> {
    tokio::fs::write(path, SAMPLE_DATA).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    }

    Ok(())
}

// Failures here never change the outcome of the run
async fn cleanup(manager: &BlobManager, file_path: &Path) {
    if let Err(e) = manager.delete_container().await {
        warn!(container = manager.container_name(), "Failed to delete container: {}", e);
    }
    if let Err(e) = tokio::fs::remove_file(file_path).await {
        warn!(path = %file_path.display(), "Failed to remove sample file: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::backend::MockBlobBackend;
    use crate::blob::{BlobDownload, BlobItem, ListBlobsSegment, Marker};
    use crate::error::{ServiceCode, StorageError};
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> BlobWorkflowOptions {
        BlobWorkflowOptions {
            container_prefix: "quickstart-".to_string(),
            work_dir: dir.path().to_path_buf(),
            upload: UploadOptions::default(),
            download: DownloadOptions::default(),
            assume_yes: false,
        }
    }

    #[tokio::test]
    async fn test_fatal_create_error_stops_before_upload() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockBlobBackend::new();
        backend.expect_create_container().returning(|_| {
            Err(StorageError::service(403, ServiceCode::AuthorizationFailure, "denied"))
        });
        backend.expect_put_blob().never();
        backend.expect_delete_container().never();

        let mut out = Vec::new();
        let mut input: &[u8] = b"\n";
        let result = run_blob_quickstart(Arc::new(backend), &options(&dir), &mut out, &mut input).await;

        assert!(matches!(result, Err(StorageError::ServiceError { status: 403, .. })));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Creating a container named quickstart-"));
        assert!(!printed.contains("Uploading"));
    }

    #[tokio::test]
    async fn test_cleanup_errors_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockBlobBackend::new();
        backend.expect_create_container().returning(|_| Ok(()));
        backend.expect_put_blob().returning(|_, _, _, _| Ok(()));
        backend.expect_list_blob_pages().returning(|_| {
            stream::iter(vec![Ok(ListBlobsSegment {
                items: vec![BlobItem::new("sample", 28)],
                next: Marker::Done,
            })])
            .boxed()
        });
        backend.expect_get_blob().returning(|_, _, _| {
            Ok(BlobDownload {
                content_length: SAMPLE_DATA.len() as u64,
                etag: None,
                stream: stream::iter(vec![Ok(Bytes::from_static(SAMPLE_DATA))]).boxed(),
            })
        });
        backend
            .expect_delete_container()
            .times(1)
            .returning(|_| Err(StorageError::network("connection refused")));

        let mut out = Vec::new();
        let mut input: &[u8] = b"\n";
        let report = run_blob_quickstart(Arc::new(backend), &options(&dir), &mut out, &mut input)
            .await
            .unwrap();

        assert_eq!(report.downloaded, SAMPLE_DATA);
        assert!(!dir.path().join(&report.blob_name).exists());
        assert!(String::from_utf8(out).unwrap().ends_with("Cleaning up.\n"));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.blob.block_size_mb = 8;
        config.blob.max_concurrent_uploads = 4;
        config.blob.download_retries = 5;

        let options = BlobWorkflowOptions::from_config(&config);
        assert_eq!(options.container_prefix, "quickstart-");
        assert_eq!(options.upload.block_size, 8 * 1024 * 1024);
        assert_eq!(options.upload.parallelism, 4);
        assert_eq!(options.download.retry.max_retries, 5);
        assert_eq!(options.work_dir, PathBuf::from("."));
    }
}
