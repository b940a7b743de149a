//! Authentication module for Azure Storage
//!
//! This module authorizes storage REST requests either with the account's
//! Shared Key or with an Azure AD bearer token from DefaultAzureCredential.

pub mod provider;
pub mod signing;

pub use provider::*;
