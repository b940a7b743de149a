//! CLI module for the quickstart binaries
//!
//! This module contains argument parsing, command execution and logging
//! setup shared by `blob-quickstart` and `table-quickstart`.

pub mod commands;
pub mod logging;

pub use commands::*;
pub use logging::init_logging;
