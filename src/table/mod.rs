//! Table entity lookup
//!
//! [`TableReader`] fetches single entities through a [`TableBackend`];
//! [`AzureTableBackend`] is the REST implementation.

pub mod models;
pub mod reader;
pub mod rest;

pub use models::*;
pub use reader::{create_table_reader, EntityRequest, TableBackend, TableReader};
pub use rest::AzureTableBackend;
