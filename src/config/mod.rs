//! Configuration management module
//!
//! Configuration is loaded once at startup from default values, an optional
//! configuration file, environment variables and finally command-line flags.

pub mod settings;

pub use settings::*;
