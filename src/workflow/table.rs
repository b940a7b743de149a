//! Table quickstart sequence: fetch one entity and print one property

use crate::config::Config;
use crate::error::Result;
use crate::table::{GetEntityOptions, TableReader};
use std::io::Write;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TableWorkflowOptions {
    pub table: String,
    pub partition_key: String,
    pub row_key: String,
    /// Property printed as a string
    pub property: String,
    pub get: GetEntityOptions,
}

impl TableWorkflowOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.table.table_name.clone(),
            partition_key: config.table.partition_key.clone(),
            row_key: config.table.row_key.clone(),
            property: config.table.property.clone(),
            get: GetEntityOptions {
                select: config.table.select.clone(),
                metadata: config.table.metadata,
                timeout: config.table.timeout(),
            },
        }
    }
}

/// Fetch the entity and print the chosen property; returns the printed value
pub async fn run_table_quickstart<W>(
    reader: &TableReader,
    options: &TableWorkflowOptions,
    out: &mut W,
) -> Result<String>
where
    W: Write + ?Sized,
{
    let entity = reader
        .get_entity(
            &options.table,
            &options.partition_key,
            &options.row_key,
            &options.get,
        )
        .await?;
    info!(
        partition_key = %entity.partition_key,
        row_key = %entity.row_key,
        properties = entity.properties.len(),
        "fetched entity"
    );

    let value = entity.get_str(&options.property)?.to_string();
    writeln!(out, "{}", value)?;

    Ok(value)
}
