//! CLI argument parsing and command execution
//!
//! This module defines the command-line interfaces of the two quickstart
//! binaries using clap and runs the matching workflow.

use crate::blob::create_blob_backend;
use crate::config::{load_config_no_validation, Config};
use crate::error::Result;
use crate::table::{create_table_reader, MetadataLevel};
use crate::workflow::{
    run_blob_quickstart, run_table_quickstart, BlobQuickstartReport, BlobWorkflowOptions,
    TableWorkflowOptions,
};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

/// Upload, list, download and delete a sample blob
#[derive(Parser, Debug)]
#[command(name = "blob-quickstart", version, about)]
pub struct BlobCli {
    /// Configuration file (TOML or JSON)
    #[arg(long, env = "STORAGE_QUICKSTART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Clean up without waiting for Enter
    #[arg(short, long)]
    pub yes: bool,

    /// Directory for the local sample file
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl BlobCli {
    /// Configuration with flags applied, not yet validated
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = load_config_no_validation(self.config.as_deref()).await?;
        if let Some(work_dir) = &self.work_dir {
            config.blob.work_dir = Some(work_dir.clone());
        }
        Ok(config)
    }

    pub fn debug_enabled(&self, config: Option<&Config>) -> bool {
        self.debug || config.is_some_and(|c| c.debug)
    }

    pub async fn execute(self, config: Config) -> Result<BlobQuickstartReport> {
        config.validate()?;
        info!(account = %config.account_name, endpoint = %config.blob_endpoint(), "starting blob quickstart");

        let backend = create_blob_backend(&config)?;
        let mut options = BlobWorkflowOptions::from_config(&config);
        options.assume_yes = self.yes;

        let mut stdout = std::io::stdout();
        let mut stdin = BufReader::new(tokio::io::stdin());
        run_blob_quickstart(backend, &options, &mut stdout, &mut stdin).await
    }
}

/// Fetch one table entity and print one of its properties
#[derive(Parser, Debug)]
#[command(name = "table-quickstart", version, about)]
pub struct TableCli {
    /// Configuration file (TOML or JSON)
    #[arg(long, env = "STORAGE_QUICKSTART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Table name
    #[arg(long)]
    pub table: Option<String>,

    #[arg(long)]
    pub partition_key: Option<String>,

    #[arg(long)]
    pub row_key: Option<String>,

    /// Property to return; repeat for several
    #[arg(long = "select", value_name = "PROPERTY")]
    pub select: Vec<String>,

    /// Property printed as a string
    #[arg(long)]
    pub property: Option<String>,

    /// OData metadata level
    #[arg(long, value_enum)]
    pub metadata: Option<MetadataLevel>,

    /// Timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl TableCli {
    /// Flags override file and environment settings
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(table) = &self.table {
            config.table.table_name = table.clone();
        }
        if let Some(partition_key) = &self.partition_key {
            config.table.partition_key = partition_key.clone();
        }
        if let Some(row_key) = &self.row_key {
            config.table.row_key = row_key.clone();
        }
        if !self.select.is_empty() {
            config.table.select = self.select.clone();
        }
        if let Some(property) = &self.property {
            config.table.property = property.clone();
        }
        if let Some(metadata) = self.metadata {
            config.table.metadata = metadata;
        }
        if let Some(timeout) = self.timeout {
            config.table.timeout_secs = timeout;
        }
    }

    /// Configuration with flags applied, not yet validated
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = load_config_no_validation(self.config.as_deref()).await?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn debug_enabled(&self, config: Option<&Config>) -> bool {
        self.debug || config.is_some_and(|c| c.debug)
    }

    pub async fn execute(self, config: Config) -> Result<String> {
        config.validate()?;
        config.validate_table()?;
        info!(account = %config.account_name, table = %config.table.table_name, "starting table quickstart");

        let reader = create_table_reader(&config)?;
        let options = TableWorkflowOptions::from_config(&config);

        let mut stdout = std::io::stdout();
        run_table_quickstart(&reader, &options, &mut stdout).await
    }
}
