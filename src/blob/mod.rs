//! Azure Blob Storage operations
//!
//! This module provides container creation and deletion, block blob upload,
//! marker-paginated listing and resumable download.

pub mod azure;
pub mod backend;
pub mod manager;
pub mod models;

// Re-export commonly used types
pub use azure::AzureBlobBackend;
pub use backend::BlobBackend;
pub use manager::{block_id, create_blob_backend, create_blob_manager, BlobManager};
pub use models::*;
