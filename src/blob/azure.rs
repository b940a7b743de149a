//! Blob service backend on the Azure SDK
//!
//! Each [`BlobBackend`] method maps to one `azure_storage_blobs` client call.
//! Listing hands out the SDK's page stream, which follows `NextMarker`
//! itself.

use crate::blob::backend::BlobBackend;
use crate::blob::models::{BlobDownload, BlobItem, GetBlobRange, ListBlobsSegment, Marker};
use crate::error::{Result, ServiceCode, StorageError};
use async_trait::async_trait;
use azure_core::prelude::IfMatchCondition;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::*;
use bytes::Bytes;
use chrono::DateTime;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;
use url::Url;

pub struct AzureBlobBackend {
    service: BlobServiceClient,
}

impl AzureBlobBackend {
    /// Client for `endpoint`, e.g. `https://myaccount.blob.core.windows.net`
    /// or a path-style emulator URL
    pub fn new(
        account: &str,
        endpoint: &str,
        credentials: StorageCredentials,
        retry: azure_core::RetryOptions,
    ) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|e| {
            StorageError::config(format!("Invalid blob endpoint '{}': {}", endpoint, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(StorageError::config(format!(
                "Invalid blob endpoint '{}'",
                endpoint
            )));
        }

        let location = CloudLocation::Custom {
            account: account.to_string(),
            uri: endpoint.trim_end_matches('/').to_string(),
        };
        let service = ClientBuilder::with_location(location, credentials)
            .retry(retry)
            .blob_service_client();

        Ok(Self { service })
    }

    fn blob_client(&self, container: &str, blob: &str) -> BlobClient {
        self.service.container_client(container).blob_client(blob)
    }
}

#[async_trait]
impl BlobBackend for AzureBlobBackend {
    async fn create_container(&self, container: &str) -> Result<()> {
        self.service.container_client(container).create().await?;
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        self.service.container_client(container).delete().await?;
        Ok(())
    }

    async fn put_blob(
        &self,
        container: &str,
        blob: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.blob_client(container, blob)
            .put_block_blob(body)
            .content_type(content_type.to_string())
            .await?;
        Ok(())
    }

    async fn put_block(
        &self,
        container: &str,
        blob: &str,
        block_id: &str,
        body: Bytes,
    ) -> Result<()> {
        self.blob_client(container, blob)
            .put_block(block_id.to_string(), body)
            .await?;
        Ok(())
    }

    async fn put_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()> {
        let block_list = BlockList {
            blocks: block_ids
                .iter()
                .map(|id| BlobBlockType::Latest(BlockId::from(id.clone())))
                .collect(),
        };

        self.blob_client(container, blob)
            .put_block_list(block_list)
            .content_type(content_type.to_string())
            .await?;
        Ok(())
    }

    fn list_blob_pages(&self, container: &str) -> BoxStream<'static, Result<ListBlobsSegment>> {
        self.service
            .container_client(container)
            .list_blobs()
            .into_stream()
            .map(|page| -> Result<ListBlobsSegment> {
                let page = page?;
                Ok(ListBlobsSegment {
                    items: page.blobs.blobs().map(BlobItem::from).collect(),
                    next: Marker::from_next_marker(
                        page.next_marker.map(|marker| marker.as_str().to_string()),
                    ),
                })
            })
            .boxed()
    }

    async fn get_blob(&self, container: &str, blob: &str, range: &GetBlobRange) -> Result<BlobDownload> {
        let client = self.blob_client(container, blob);

        // Ranged reads starting at the end of the blob fail with 416
        let properties = client.get_properties().await?.blob.properties;
        let etag = properties.etag.to_string();
        if let Some(expected) = &range.if_match {
            if *expected != etag {
                return Err(StorageError::service(
                    412,
                    ServiceCode::ConditionNotMet,
                    format!("Blob '{}' changed while it was being read", blob),
                ));
            }
        }

        let total = properties.content_length;
        let content_length = total.saturating_sub(range.offset);
        debug!(container, blob, offset = range.offset, content_length, "opened blob download");

        if content_length == 0 {
            return Ok(BlobDownload {
                content_length,
                etag: Some(etag),
                stream: stream::empty().boxed(),
            });
        }

        let stream = client
            .get()
            .range(range.offset..)
            .if_match(IfMatchCondition::Match(etag.clone()))
            .into_stream()
            .map_err(StorageError::from)
            .map_ok(|response| response.data.map_err(StorageError::from))
            .try_flatten()
            .boxed();

        Ok(BlobDownload {
            content_length,
            etag: Some(etag),
            stream,
        })
    }
}

impl From<&Blob> for BlobItem {
    fn from(blob: &Blob) -> Self {
        let properties = &blob.properties;
        Self {
            name: blob.name.clone(),
            content_length: properties.content_length,
            content_type: Some(properties.content_type.clone()).filter(|s| !s.is_empty()),
            etag: Some(properties.etag.to_string()).filter(|s| !s.is_empty()),
            last_modified: DateTime::from_timestamp(
                properties.last_modified.unix_timestamp(),
                properties.last_modified.nanosecond(),
            ),
        }
    }
}
