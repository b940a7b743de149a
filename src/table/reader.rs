//! Table entity reader
//!
//! Point lookups of a single entity with projection, metadata level and a
//! deadline. The wire access sits behind [`TableBackend`].

use crate::auth::AuthProviderFactory;
use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::pipeline::HttpPipeline;
use crate::table::models::{Entity, GetEntityOptions, MetadataLevel};
use crate::table::rest::AzureTableBackend;
use crate::utils::network::{create_http_client, NetworkConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One entity lookup as sent to the service
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRequest {
    pub table: String,
    pub partition_key: String,
    pub row_key: String,
    pub select: Vec<String>,
    pub metadata: MetadataLevel,
    /// Server-side timeout
    pub timeout: Duration,
}

/// Raw access to the table service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Fetch one entity and return its JSON representation
    async fn query_entity(&self, request: &EntityRequest) -> Result<Value>;
}

pub struct TableReader {
    backend: Arc<dyn TableBackend>,
}

impl TableReader {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Fetch a single entity.
    ///
    /// The options' timeout is sent to the service and also enforced locally;
    /// exceeding it yields [`StorageError::Timeout`]. When `select` is set,
    /// properties outside the projection are never returned.
    pub async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        options: &GetEntityOptions,
    ) -> Result<Entity> {
        if table.trim().is_empty() {
            return Err(StorageError::invalid_argument("Table name cannot be empty"));
        }
        if options.timeout.is_zero() {
            return Err(StorageError::invalid_argument("Timeout must be greater than zero"));
        }

        let request = EntityRequest {
            table: table.to_string(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
            select: options.select.clone(),
            metadata: options.metadata,
            timeout: options.timeout,
        };

        debug!(table, partition_key, row_key, select = ?options.select, "fetching entity");

        let value = tokio::time::timeout(options.timeout, self.backend.query_entity(&request))
            .await
            .map_err(|_| {
                StorageError::timeout(format!(
                    "Fetching entity ({}, {}) from table '{}' took longer than {:?}",
                    partition_key, row_key, table, options.timeout
                ))
            })??;

        let mut entity = Entity::from_json(value)?;
        if !options.select.is_empty() {
            entity.project(&options.select);
        }

        Ok(entity)
    }
}

/// Helper function to create a TableReader from configuration
pub fn create_table_reader(config: &Config) -> Result<TableReader> {
    let auth = AuthProviderFactory::create_provider(config)?;
    let client = create_http_client(&NetworkConfig::default())?;
    let pipeline = HttpPipeline::new(client, auth, config.retry.clone());
    let backend = AzureTableBackend::new(pipeline, &config.table_endpoint())?;

    Ok(TableReader::new(Arc::new(backend)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceCode;
    use serde_json::json;

    fn options(select: &[&str]) -> GetEntityOptions {
        GetEntityOptions {
            select: select.iter().map(|s| s.to_string()).collect(),
            metadata: MetadataLevel::Full,
            timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_get_entity_forwards_request_fields() {
        let mut backend = MockTableBackend::new();
        backend
            .expect_query_entity()
            .withf(|request| {
                request.table == "people"
                    && request.partition_key == "PartitionKey"
                    && request.row_key == "RowKey"
                    && request.select == vec!["one property".to_string()]
                    && request.metadata == MetadataLevel::Full
                    && request.timeout == Duration::from_secs(30)
            })
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "PartitionKey": "PartitionKey",
                    "RowKey": "RowKey",
                    "one property": "hello"
                }))
            });

        let reader = TableReader::new(Arc::new(backend));
        let entity = reader
            .get_entity("people", "PartitionKey", "RowKey", &options(&["one property"]))
            .await
            .unwrap();

        assert_eq!(entity.get_str("one property").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_select_drops_unrequested_properties() {
        let mut backend = MockTableBackend::new();
        backend.expect_query_entity().returning(|_| {
            Ok(json!({
                "PartitionKey": "pk",
                "RowKey": "rk",
                "one property": "kept",
                "other property": "dropped",
                "Count": 3
            }))
        });

        let reader = TableReader::new(Arc::new(backend));
        let entity = reader
            .get_entity("people", "pk", "rk", &options(&["one property"]))
            .await
            .unwrap();

        assert_eq!(entity.properties.len(), 1);
        assert!(entity.get("other property").is_none());
        assert!(entity.get("Count").is_none());
    }

    #[tokio::test]
    async fn test_service_errors_pass_through() {
        let mut backend = MockTableBackend::new();
        backend.expect_query_entity().returning(|_| {
            Err(StorageError::service(
                404,
                ServiceCode::ResourceNotFound,
                "The specified resource does not exist.",
            ))
        });

        let reader = TableReader::new(Arc::new(backend));
        let error = reader
            .get_entity("people", "pk", "rk", &options(&[]))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
        assert!(!error.is_timeout());
    }

    #[tokio::test]
    async fn test_empty_table_name_is_rejected_without_a_request() {
        let mut backend = MockTableBackend::new();
        backend.expect_query_entity().never();

        let reader = TableReader::new(Arc::new(backend));
        let result = reader.get_entity("  ", "pk", "rk", &options(&[])).await;
        tokio_test::assert_err!(result);
    }
}
