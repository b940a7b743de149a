//! Blob service operations used by [`BlobManager`](crate::blob::BlobManager)

use crate::blob::models::{BlobDownload, GetBlobRange, ListBlobsSegment};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// One method per service operation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn create_container(&self, container: &str) -> Result<()>;

    async fn delete_container(&self, container: &str) -> Result<()>;

    /// Create or replace a block blob in one request
    async fn put_blob(&self, container: &str, blob: &str, body: Bytes, content_type: &str)
        -> Result<()>;

    /// Stage one uncommitted block
    async fn put_block(&self, container: &str, blob: &str, block_id: &str, body: Bytes)
        -> Result<()>;

    /// Commit staged blocks in the given order
    async fn put_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()>;

    /// List Blobs pages in order, one request per polled page.
    ///
    /// Each page carries the marker of the page after it; the last page
    /// carries [`Marker::Done`](crate::blob::Marker::Done).
    fn list_blob_pages(&self, container: &str) -> BoxStream<'static, Result<ListBlobsSegment>>;

    async fn get_blob(&self, container: &str, blob: &str, range: &GetBlobRange)
        -> Result<BlobDownload>;
}
