//! Table service REST backend

use crate::error::{Result, StorageError};
use crate::pipeline::HttpPipeline;
use crate::table::reader::{EntityRequest, TableBackend};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use url::Url;

pub struct AzureTableBackend {
    pipeline: HttpPipeline,
    endpoint: Url,
}

impl AzureTableBackend {
    pub fn new(pipeline: HttpPipeline, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StorageError::config(format!("Invalid table endpoint '{}': {}", endpoint, e))
        })?;
        Ok(Self { pipeline, endpoint })
    }

    /// `{endpoint}/{table}(PartitionKey='..',RowKey='..')?$select=..&timeout=..`
    pub fn entity_url(&self, request: &EntityRequest) -> Result<Url> {
        let mut url = self.endpoint.clone();
        let resource = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            request.table,
            escape_key(&request.partition_key),
            escape_key(&request.row_key)
        );
        url.path_segments_mut()
            .map_err(|_| StorageError::config("Table endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(&resource);

        let mut query = Vec::new();
        if !request.select.is_empty() {
            query.push(format!("$select={}", encode_query_value(&request.select.join(","))));
        }
        query.push(format!("timeout={}", request.timeout.as_secs().max(1)));
        url.set_query(Some(&query.join("&")));

        Ok(url)
    }
}

#[async_trait]
impl TableBackend for AzureTableBackend {
    async fn query_entity(&self, request: &EntityRequest) -> Result<Value> {
        let url = self.entity_url(request)?;
        let accept = request.metadata.accept_header();

        let response = self
            .pipeline
            .send(|client| {
                client
                    .get(url.clone())
                    .header(ACCEPT, accept)
                    .header("DataServiceVersion", "3.0")
                    .header("MaxDataServiceVersion", "3.0;NetFx")
            })
            .await?;

        let body = response.bytes().await.map_err(|e| {
            StorageError::network(format!("Failed to read entity response: {}", e))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            StorageError::serialization(format!("Entity response is not valid JSON: {}", e))
        })
    }
}

// Single quotes inside a key literal are doubled
fn escape_key(key: &str) -> String {
    key.replace('\'', "''")
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
