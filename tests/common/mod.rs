//! In-memory blob and table backends for workflow tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage_quickstart::blob::{
    BlobBackend, BlobDownload, BlobItem, GetBlobRange, ListBlobsSegment, Marker,
};
use storage_quickstart::error::{Result, ServiceCode, StorageError};
use storage_quickstart::table::{EntityRequest, MetadataLevel, TableBackend};
use storage_quickstart::utils::retry::RetryOptions;

/// Backoff short enough for tests
pub fn fast_retry(max_retries: usize) -> RetryOptions {
    RetryOptions {
        max_retries,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    etag: String,
    content_type: String,
}

#[derive(Debug, Default)]
struct Container {
    blobs: BTreeMap<String, StoredBlob>,
    staged: HashMap<(String, String), Bytes>,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub create_container: AtomicUsize,
    pub delete_container: AtomicUsize,
    pub put_blob: AtomicUsize,
    pub put_block: AtomicUsize,
    pub put_block_list: AtomicUsize,
    /// Pages handed out, counted as they are polled
    pub list_blob_pages: AtomicUsize,
    pub get_blob: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Blob service double with paging, concurrency tracking and read failures
pub struct InMemoryBlobBackend {
    containers: Mutex<BTreeMap<String, Container>>,
    page_size: usize,
    chunk_size: usize,
    block_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    etag_counter: AtomicUsize,
    read_failures: Mutex<VecDeque<usize>>,
    get_offsets: Mutex<Vec<u64>>,
    replace_on_open: Mutex<Option<&'static [u8]>>,
    pub calls: Arc<Calls>,
}

impl Default for InMemoryBlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBlobBackend {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(BTreeMap::new()),
            page_size: 5000,
            chunk_size: 8,
            block_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            etag_counter: AtomicUsize::new(0),
            read_failures: Mutex::new(VecDeque::new()),
            get_offsets: Mutex::new(Vec::new()),
            replace_on_open: Mutex::new(None),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = delay;
        self
    }

    /// The next opened download breaks after `bytes` bytes; one entry per open
    pub fn fail_reads_after(&self, bytes: &[usize]) {
        self.read_failures.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Replace the blob right after the next download is opened
    pub fn replace_on_next_open(&self, data: &'static [u8]) {
        *self.replace_on_open.lock().unwrap() = Some(data);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn get_offsets(&self) -> Vec<u64> {
        self.get_offsets.lock().unwrap().clone()
    }

    pub fn container_exists(&self, container: &str) -> bool {
        self.containers.lock().unwrap().contains_key(container)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.containers.lock().unwrap().keys().cloned().collect()
    }

    pub fn blob_data(&self, container: &str, blob: &str) -> Option<Bytes> {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .and_then(|c| c.blobs.get(blob))
            .map(|b| b.data.clone())
    }

    pub fn blob_content_type(&self, container: &str, blob: &str) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .and_then(|c| c.blobs.get(blob))
            .map(|b| b.content_type.clone())
    }

    /// Replace a blob's contents, changing its ETag
    pub fn overwrite_blob(&self, container: &str, blob: &str, data: &'static [u8]) {
        let etag = self.next_etag();
        let mut containers = self.containers.lock().unwrap();
        if let Some(stored) = containers
            .get_mut(container)
            .and_then(|c| c.blobs.get_mut(blob))
        {
            stored.data = Bytes::from_static(data);
            stored.etag = etag;
        }
    }

    fn next_etag(&self) -> String {
        format!("\"0x{:X}\"", self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn container_not_found() -> StorageError {
        StorageError::service(
            404,
            ServiceCode::ContainerNotFound,
            "The specified container does not exist.",
        )
    }

    /// Every page of the container as it is now, each naming the next
    /// page's first blob as its marker
    fn snapshot_pages(&self, container: &str) -> Vec<Result<ListBlobsSegment>> {
        let containers = self.containers.lock().unwrap();
        let Some(c) = containers.get(container) else {
            return vec![Err(Self::container_not_found())];
        };

        let items: Vec<BlobItem> = c
            .blobs
            .iter()
            .map(|(name, blob)| BlobItem {
                name: name.clone(),
                content_length: blob.data.len() as u64,
                content_type: Some(blob.content_type.clone()),
                etag: Some(blob.etag.clone()),
                last_modified: None,
            })
            .collect();
        if items.is_empty() {
            return vec![Ok(ListBlobsSegment {
                items,
                next: Marker::Done,
            })];
        }

        let chunks: Vec<Vec<BlobItem>> = items.chunks(self.page_size).map(<[BlobItem]>::to_vec).collect();
        let markers: Vec<Marker> = chunks
            .iter()
            .skip(1)
            .map(|chunk| Marker::Next(chunk[0].name.clone()))
            .chain(std::iter::once(Marker::Done))
            .collect();

        chunks
            .into_iter()
            .zip(markers)
            .map(|(items, next)| Ok(ListBlobsSegment { items, next }))
            .collect()
    }

    fn store_blob(&self, container: &str, blob: &str, data: Bytes, content_type: &str) -> Result<()> {
        let etag = self.next_etag();
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(container)
            .ok_or_else(Self::container_not_found)?;
        container.blobs.insert(
            blob.to_string(),
            StoredBlob {
                data,
                etag,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl BlobBackend for InMemoryBlobBackend {
    async fn create_container(&self, container: &str) -> Result<()> {
        self.calls.create_container.fetch_add(1, Ordering::SeqCst);
        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(container) {
            return Err(StorageError::service(
                409,
                ServiceCode::ContainerAlreadyExists,
                "The specified container already exists.",
            ));
        }
        containers.insert(container.to_string(), Container::default());
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        self.calls.delete_container.fetch_add(1, Ordering::SeqCst);
        self.containers
            .lock()
            .unwrap()
            .remove(container)
            .map(|_| ())
            .ok_or_else(Self::container_not_found)
    }

    async fn put_blob(&self, container: &str, blob: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.calls.put_blob.fetch_add(1, Ordering::SeqCst);
        self.store_blob(container, blob, body, content_type)
    }

    async fn put_block(&self, container: &str, blob: &str, block_id: &str, body: Bytes) -> Result<()> {
        self.calls.put_block.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.block_delay.is_zero() {
            tokio::time::sleep(self.block_delay).await;
        }

        let result = {
            let mut containers = self.containers.lock().unwrap();
            match containers.get_mut(container) {
                Some(c) => {
                    c.staged
                        .insert((blob.to_string(), block_id.to_string()), body);
                    Ok(())
                }
                None => Err(Self::container_not_found()),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn put_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()> {
        self.calls.put_block_list.fetch_add(1, Ordering::SeqCst);
        let data = {
            let mut containers = self.containers.lock().unwrap();
            let c = containers
                .get_mut(container)
                .ok_or_else(Self::container_not_found)?;

            let mut data = Vec::new();
            for id in block_ids {
                let block = c
                    .staged
                    .get(&(blob.to_string(), id.clone()))
                    .ok_or_else(|| {
                        StorageError::service(
                            400,
                            ServiceCode::Other("InvalidBlockList".to_string()),
                            "The specified block list is invalid.",
                        )
                    })?;
                data.extend_from_slice(block);
            }
            c.staged.retain(|(name, _), _| name != blob);
            data
        };

        self.store_blob(container, blob, Bytes::from(data), content_type)
    }

    fn list_blob_pages(&self, container: &str) -> BoxStream<'static, Result<ListBlobsSegment>> {
        let pages = self.snapshot_pages(container);
        let calls = Arc::clone(&self.calls);
        stream::iter(pages)
            .map(move |page| {
                calls.list_blob_pages.fetch_add(1, Ordering::SeqCst);
                page
            })
            .boxed()
    }

    async fn get_blob(&self, container: &str, blob: &str, range: &GetBlobRange) -> Result<BlobDownload> {
        self.calls.get_blob.fetch_add(1, Ordering::SeqCst);
        self.get_offsets.lock().unwrap().push(range.offset);

        let stored = {
            let containers = self.containers.lock().unwrap();
            let c = containers
                .get(container)
                .ok_or_else(Self::container_not_found)?;
            c.blobs.get(blob).cloned().ok_or_else(|| {
                StorageError::service(404, ServiceCode::BlobNotFound, "The specified blob does not exist.")
            })?
        };

        if let Some(expected) = &range.if_match {
            if expected != &stored.etag {
                return Err(StorageError::service(
                    412,
                    ServiceCode::ConditionNotMet,
                    "The condition specified using HTTP conditional header(s) is not met.",
                ));
            }
        }

        let replacement = self.replace_on_open.lock().unwrap().take();
        if let Some(data) = replacement {
            self.overwrite_blob(container, blob, data);
        }

        let offset = (range.offset as usize).min(stored.data.len());
        let data = stored.data.slice(offset..);
        let fail_after = self.read_failures.lock().unwrap().pop_front();

        let mut chunks: Vec<Result<Bytes>> = Vec::new();
        let mut position = 0;
        let limit = fail_after.unwrap_or(data.len()).min(data.len());
        while position < limit {
            let end = (position + self.chunk_size).min(limit);
            chunks.push(Ok(data.slice(position..end)));
            position = end;
        }
        if fail_after.is_some() {
            chunks.push(Err(StorageError::network("connection reset while reading body")));
        }

        Ok(BlobDownload {
            content_length: data.len() as u64,
            etag: Some(stored.etag),
            stream: stream::iter(chunks).boxed(),
        })
    }
}

/// Table service double returning stored entities with metadata annotations
pub struct InMemoryTableBackend {
    entities: Mutex<HashMap<(String, String, String), Map<String, Value>>>,
    delay: Duration,
    requests: Mutex<Vec<EntityRequest>>,
}

impl Default for InMemoryTableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableBackend {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert(&self, table: &str, partition_key: &str, row_key: &str, properties: Value) {
        let mut entity = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        entity.insert("PartitionKey".to_string(), json!(partition_key));
        entity.insert("RowKey".to_string(), json!(row_key));
        entity.insert("Timestamp".to_string(), json!("2024-01-01T00:00:00.0000000Z"));
        self.entities.lock().unwrap().insert(
            (table.to_string(), partition_key.to_string(), row_key.to_string()),
            entity,
        );
    }

    pub fn requests(&self) -> Vec<EntityRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableBackend for InMemoryTableBackend {
    async fn query_entity(&self, request: &EntityRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let key = (
            request.table.clone(),
            request.partition_key.clone(),
            request.row_key.clone(),
        );
        let mut entity = self.entities.lock().unwrap().get(&key).cloned().ok_or_else(|| {
            StorageError::service(404, ServiceCode::ResourceNotFound, "The specified resource does not exist.")
        })?;

        let edit_link = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            request.table, request.partition_key, request.row_key
        );
        match request.metadata {
            MetadataLevel::None => {}
            MetadataLevel::Minimal => {
                entity.insert("odata.etag".to_string(), json!("W/\"datetime'2024-01-01'\""));
            }
            MetadataLevel::Full => {
                entity.insert("odata.type".to_string(), json!(format!("account.{}", request.table)));
                entity.insert("odata.id".to_string(), json!(format!("https://account.table.core.windows.net/{}", edit_link)));
                entity.insert("odata.etag".to_string(), json!("W/\"datetime'2024-01-01'\""));
                entity.insert("odata.editLink".to_string(), json!(edit_link));
                entity.insert("Timestamp@odata.type".to_string(), json!("Edm.DateTime"));
            }
        }

        Ok(Value::Object(entity))
    }
}
