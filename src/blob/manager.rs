//! Container and blob lifecycle manager
//!
//! This module provides the BlobManager struct used by the blob workflow:
//! container creation and deletion, file upload (single request or staged
//! blocks), marker-driven listing and resumable downloads.

use crate::auth::AuthProviderFactory;
use crate::blob::azure::AzureBlobBackend;
use crate::blob::backend::BlobBackend;
use crate::blob::models::*;
use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::utils::network::is_retryable_error;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Core blob storage manager bound to one container
pub struct BlobManager {
    backend: Arc<dyn BlobBackend>,
    container_name: String,
}

impl BlobManager {
    pub fn new(backend: Arc<dyn BlobBackend>, container_name: impl Into<String>) -> Self {
        Self {
            backend,
            container_name: container_name.into(),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Create the container.
    ///
    /// A name collision surfaces as a 409 `ContainerAlreadyExists` service
    /// error; callers decide whether that is fatal.
    pub async fn create_container(&self) -> Result<()> {
        info!(container = %self.container_name, "creating container");
        self.backend.create_container(&self.container_name).await
    }

    pub async fn delete_container(&self) -> Result<()> {
        info!(container = %self.container_name, "deleting container");
        self.backend.delete_container(&self.container_name).await
    }

    /// Upload a local file as a block blob.
    ///
    /// Files up to `max_single_put_size` go up in one Put Blob. Larger files
    /// are staged in `block_size` blocks with at most `parallelism` requests
    /// in flight and committed with one Put Block List in file order.
    pub async fn upload_file(
        &self,
        path: &Path,
        blob_name: &str,
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        if options.block_size == 0 {
            return Err(StorageError::invalid_argument("Block size must be greater than zero"));
        }
        if options.parallelism == 0 {
            return Err(StorageError::invalid_argument("Parallelism must be greater than zero"));
        }
        if blob_name.trim().is_empty() {
            return Err(StorageError::invalid_argument("Blob name cannot be empty"));
        }

        let content_type = options.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(blob_name)
                .first_or_octet_stream()
                .to_string()
        });

        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        if size <= options.max_single_put_size {
            debug!(blob = blob_name, size, "uploading with a single put");
            let mut body = Vec::with_capacity(size as usize);
            let mut file = file;
            file.read_to_end(&mut body).await?;
            let size = body.len() as u64;

            self.backend
                .put_blob(&self.container_name, blob_name, Bytes::from(body), &content_type)
                .await?;

            return Ok(UploadReport {
                blob_name: blob_name.to_string(),
                size,
                blocks: 0,
            });
        }

        let expected_blocks = size.div_ceil(options.block_size as u64);
        if expected_blocks > MAX_BLOCKS as u64 {
            return Err(StorageError::invalid_argument(format!(
                "File of {} bytes needs {} blocks of {} bytes; at most {} blocks are allowed",
                size, expected_blocks, options.block_size, MAX_BLOCKS
            )));
        }

        debug!(
            blob = blob_name,
            size,
            blocks = expected_blocks,
            parallelism = options.parallelism,
            "uploading in blocks"
        );

        let id_prefix = Uuid::new_v4().simple().to_string();
        let block_size = options.block_size;
        let backend = &self.backend;
        let container = self.container_name.as_str();
        let id_prefix_ref = id_prefix.as_str();

        let chunks = stream::try_unfold((file, 0usize), move |(mut file, index)| async move {
            let mut buffer = Vec::with_capacity(block_size);
            (&mut file)
                .take(block_size as u64)
                .read_to_end(&mut buffer)
                .await?;
            if buffer.is_empty() {
                return Ok::<_, StorageError>(None);
            }
            if index >= MAX_BLOCKS {
                return Err(StorageError::invalid_argument(format!(
                    "File grew beyond {} blocks during upload",
                    MAX_BLOCKS
                )));
            }
            Ok(Some(((index, Bytes::from(buffer)), (file, index + 1))))
        });

        let mut staged: Vec<(usize, u64)> = chunks
            .map_ok(|(index, body)| async move {
                let len = body.len() as u64;
                let id = block_id(id_prefix_ref, index);
                backend.put_block(container, blob_name, &id, body).await?;
                Ok::<_, StorageError>((index, len))
            })
            .try_buffer_unordered(options.parallelism)
            .try_collect()
            .await?;

        staged.sort_unstable_by_key(|(index, _)| *index);
        let uploaded: u64 = staged.iter().map(|(_, len)| len).sum();
        let block_ids: Vec<String> = staged
            .iter()
            .map(|(index, _)| block_id(&id_prefix, *index))
            .collect();

        self.backend
            .put_block_list(&self.container_name, blob_name, &block_ids, &content_type)
            .await?;

        Ok(UploadReport {
            blob_name: blob_name.to_string(),
            size: uploaded,
            blocks: block_ids.len(),
        })
    }

    /// List every blob, following markers until the last page
    pub async fn list_blobs(&self) -> Result<Vec<BlobItem>> {
        self.list_blobs_stream().try_collect().await
    }

    /// Lazily list every blob, one page request at a time.
    ///
    /// Ends after the page whose marker is [`Marker::Done`]; pages running
    /// out while a marker is still pending is an error.
    pub fn list_blobs_stream(&self) -> BoxStream<'static, Result<BlobItem>> {
        let pages = self.backend.list_blob_pages(&self.container_name);
        let container = self.container_name.clone();

        stream::try_unfold((pages, Marker::Start), move |(mut pages, marker)| {
            let container = container.clone();
            async move {
                if !marker.not_done() {
                    return Ok::<_, StorageError>(None);
                }
                let segment = match pages.next().await {
                    Some(segment) => segment?,
                    None => {
                        return Err(StorageError::unknown(format!(
                            "Listing of container '{}' ended before the last page",
                            container
                        )))
                    }
                };
                debug!(items = segment.items.len(), next = ?segment.next, "listed blob segment");
                Ok(Some((
                    stream::iter(segment.items.into_iter().map(Ok::<_, StorageError>)),
                    (pages, segment.next),
                )))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Stream a blob into `writer`, resuming after transient read errors.
    ///
    /// A failed body read reopens the blob at the number of bytes already
    /// written, guarded by the ETag of the first response. After
    /// `options.retry.max_retries` reopenings the error is returned.
    pub async fn download_blob_to<W>(
        &self,
        blob_name: &str,
        writer: &mut W,
        options: &DownloadOptions,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut range = GetBlobRange::default();
        let mut download = self
            .backend
            .get_blob(&self.container_name, blob_name, &range)
            .await?;
        let total = download.content_length;
        range.if_match = download.etag.clone();

        let mut written = 0u64;
        let mut retries = 0usize;

        loop {
            let error = match download.stream.next().await {
                Some(Ok(chunk)) => {
                    writer.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                    continue;
                }
                Some(Err(error)) => error,
                None if written < total => StorageError::network(format!(
                    "Blob '{}' ended after {} of {} bytes",
                    blob_name, written, total
                )),
                None => break,
            };

            download = self
                .reopen(blob_name, &mut range, written, &mut retries, error, options)
                .await?;
        }

        writer.flush().await?;
        Ok(written)
    }

    /// Download a whole blob into memory
    pub async fn download_blob(&self, blob_name: &str, options: &DownloadOptions) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.download_blob_to(blob_name, &mut buffer, options).await?;
        Ok(buffer)
    }

    async fn reopen(
        &self,
        blob_name: &str,
        range: &mut GetBlobRange,
        offset: u64,
        retries: &mut usize,
        mut error: StorageError,
        options: &DownloadOptions,
    ) -> Result<BlobDownload> {
        loop {
            if *retries >= options.retry.max_retries || !is_retryable_error(&error) {
                return Err(error);
            }
            *retries += 1;

            let delay = options.retry.delay_for(*retries);
            warn!(
                blob = blob_name,
                offset,
                attempt = *retries,
                ?delay,
                "blob read failed, resuming: {}",
                error
            );
            tokio::time::sleep(delay).await;

            range.offset = offset;
            match self
                .backend
                .get_blob(&self.container_name, blob_name, range)
                .await
            {
                Ok(download) => return Ok(download),
                Err(e) => error = e,
            }
        }
    }
}

/// Base64 block id; every id of one upload has the same length
pub fn block_id(prefix: &str, index: usize) -> String {
    BASE64.encode(format!("{}-{:06}", prefix, index))
}

/// Build the SDK backend described by the configuration
pub fn create_blob_backend(config: &Config) -> Result<Arc<dyn BlobBackend>> {
    let credentials = AuthProviderFactory::storage_credentials(config)?;
    let backend = AzureBlobBackend::new(
        &config.account_name,
        &config.blob_endpoint(),
        credentials,
        config.retry.to_sdk(),
    )?;

    Ok(Arc::new(backend))
}

/// Helper function to create a BlobManager from configuration
pub fn create_blob_manager(config: &Config, container_name: &str) -> Result<BlobManager> {
    Ok(BlobManager::new(create_blob_backend(config)?, container_name))
}
