//! The two quickstart sequences and their shared error dispatch

pub mod blob;
pub mod table;

pub use blob::{run_blob_quickstart, BlobQuickstartReport, BlobWorkflowOptions, SAMPLE_DATA};
pub use table::{run_table_quickstart, TableWorkflowOptions};

use crate::error::{ErrorDisposition, Result};
use std::io::Write;
use tracing::info;

/// Single dispatch point for step results.
///
/// Benign service errors are printed and swallowed (`Ok(None)`); everything
/// else is returned for the caller to propagate.
pub fn handle_errors<T, W>(result: Result<T>, out: &mut W) -> Result<Option<T>>
where
    W: Write + ?Sized,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) => match error.disposition() {
            ErrorDisposition::Benign(message) => {
                info!("ignoring benign error: {}", error);
                writeln!(out, "{}", message)?;
                Ok(None)
            }
            ErrorDisposition::Fatal => Err(error),
        },
    }
}
