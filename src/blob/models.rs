//! Data models for blob storage operations
//!
//! This module defines the listing marker, list results and the options used
//! by uploads and downloads.

use crate::error::Result;
use crate::utils::retry::RetryOptions;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Default size of one staged block
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
/// Default number of block uploads in flight
pub const DEFAULT_PARALLELISM: usize = 16;
/// Files up to this size are sent with a single Put Blob
pub const DEFAULT_MAX_SINGLE_PUT_SIZE: u64 = 256 * 1024 * 1024;
/// Service limit on committed blocks per blob
pub const MAX_BLOCKS: usize = 50_000;

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Before the first page
    Start,
    /// Continuation token returned by the previous page
    Next(String),
    /// The last page has been read
    Done,
}

impl Marker {
    /// Build the marker following a page from its `NextMarker` value
    pub fn from_next_marker(next: Option<String>) -> Self {
        match next {
            Some(token) if !token.is_empty() => Self::Next(token),
            _ => Self::Done,
        }
    }

    pub fn not_done(&self) -> bool {
        !matches!(self, Self::Done)
    }

    /// Token to send as the `marker` query parameter
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Next(token) => Some(token),
            _ => None,
        }
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self::Start
    }
}

/// A blob as returned by List Blobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobItem {
    pub name: String,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobItem {
    pub fn new(name: impl Into<String>, content_length: u64) -> Self {
        Self {
            name: name.into(),
            content_length,
            content_type: None,
            etag: None,
            last_modified: None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListBlobsSegment {
    pub items: Vec<BlobItem>,
    pub next: Marker,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub block_size: usize,
    pub parallelism: usize,
    pub max_single_put_size: u64,
    /// Guessed from the blob name when unset
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            max_single_put_size: DEFAULT_MAX_SINGLE_PUT_SIZE,
            content_type: None,
        }
    }
}

/// Outcome of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub blob_name: String,
    pub size: u64,
    /// Zero for a single Put Blob
    pub blocks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Only `max_retries` and the backoff intervals are used
    pub retry: RetryOptions,
}

/// Parameters of one Get Blob call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetBlobRange {
    /// Start of the byte range; zero reads the whole blob
    pub offset: u64,
    /// ETag the blob must still match
    pub if_match: Option<String>,
}

/// Open Get Blob response
pub struct BlobDownload {
    /// Length of the returned range
    pub content_length: u64,
    pub etag: Option<String>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobDownload")
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}
