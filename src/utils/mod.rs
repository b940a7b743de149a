//! Utility functions module
//!
//! HTTP client construction, retry logic and resource naming helpers.

pub mod helpers;
pub mod network;
pub mod retry;

pub use helpers::*;
pub use network::*;
pub use retry::*;
