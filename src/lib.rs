//! storage-quickstart - Azure Storage quickstart samples
//!
//! Library behind the `blob-quickstart` and `table-quickstart` binaries:
//! Shared Key and Azure AD request authorization, a blob lifecycle manager on
//! the Azure SDK with block upload, paginated listing and resumable download,
//! and a table entity reader with projection and timeouts.

pub mod auth;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod table;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, StorageError};
