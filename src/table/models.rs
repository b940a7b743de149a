//! Data models for table entity lookups

use crate::error::{Result, StorageError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Amount of OData metadata requested with an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MetadataLevel {
    None,
    Minimal,
    Full,
}

impl MetadataLevel {
    pub fn accept_header(&self) -> &'static str {
        match self {
            Self::None => "application/json;odata=nometadata",
            Self::Minimal => "application/json;odata=minimalmetadata",
            Self::Full => "application/json;odata=fullmetadata",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetEntityOptions {
    /// Properties to return; empty means all of them
    pub select: Vec<String>,
    pub metadata: MetadataLevel,
    pub timeout: Duration,
}

impl Default for GetEntityOptions {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            metadata: MetadataLevel::Minimal,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A typed entity property value
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Guid(String),
    Binary(Vec<u8>),
}

impl EntityValue {
    /// EDM type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "Edm.String",
            Self::Int32(_) => "Edm.Int32",
            Self::Int64(_) => "Edm.Int64",
            Self::Double(_) => "Edm.Double",
            Self::Boolean(_) => "Edm.Boolean",
            Self::DateTime(_) => "Edm.DateTime",
            Self::Guid(_) => "Edm.Guid",
            Self::Binary(_) => "Edm.Binary",
        }
    }

    fn from_json(name: &str, value: &Value, edm_type: Option<&str>) -> Result<Self> {
        let invalid = || {
            StorageError::serialization(format!(
                "Property '{}' has a value that does not match {}",
                name,
                edm_type.unwrap_or("its JSON type")
            ))
        };

        match edm_type {
            Some("Edm.String") => value
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(invalid),
            Some("Edm.Int32") => value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Self::Int32)
                .ok_or_else(invalid),
            Some("Edm.Int64") => match value {
                Value::String(s) => s.parse().map(Self::Int64).map_err(|_| invalid()),
                other => other.as_i64().map(Self::Int64).ok_or_else(invalid),
            },
            Some("Edm.Double") => match value {
                Value::String(s) => match s.as_str() {
                    "NaN" => Ok(Self::Double(f64::NAN)),
                    "Infinity" => Ok(Self::Double(f64::INFINITY)),
                    "-Infinity" => Ok(Self::Double(f64::NEG_INFINITY)),
                    other => other.parse().map(Self::Double).map_err(|_| invalid()),
                },
                other => other.as_f64().map(Self::Double).ok_or_else(invalid),
            },
            Some("Edm.Boolean") => value.as_bool().map(Self::Boolean).ok_or_else(invalid),
            Some("Edm.DateTime") => value
                .as_str()
                .and_then(parse_datetime)
                .map(Self::DateTime)
                .ok_or_else(invalid),
            Some("Edm.Guid") => value.as_str().map(|s| Self::Guid(s.to_string())).ok_or_else(invalid),
            Some("Edm.Binary") => value
                .as_str()
                .and_then(|s| BASE64.decode(s).ok())
                .map(Self::Binary)
                .ok_or_else(invalid),
            Some(other) => Err(StorageError::serialization(format!(
                "Property '{}' has unsupported type {}",
                name, other
            ))),
            None => match value {
                Value::String(s) => Ok(Self::String(s.clone())),
                Value::Bool(b) => Ok(Self::Boolean(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(i32::try_from(i).map(Self::Int32).unwrap_or(Self::Int64(i))),
                    None => n.as_f64().map(Self::Double).ok_or_else(invalid),
                },
                _ => Err(invalid()),
            },
        }
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// OData annotations returned with minimal or full metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataAnnotations {
    pub metadata: Option<String>,
    pub type_name: Option<String>,
    pub id: Option<String>,
    pub etag: Option<String>,
    pub edit_link: Option<String>,
}

/// A table entity addressed by partition key and row key
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub odata: ODataAnnotations,
    pub properties: BTreeMap<String, EntityValue>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            odata: ODataAnnotations::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Build an entity from the service's JSON representation
    pub fn from_json(value: Value) -> Result<Self> {
        let object: Map<String, Value> = match value {
            Value::Object(object) => object,
            other => {
                return Err(StorageError::serialization(format!(
                    "Expected an entity object, got {}",
                    other
                )))
            }
        };

        let string_field = |key: &str| object.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

        let mut entity = Entity::new(
            string_field("PartitionKey").unwrap_or_default(),
            string_field("RowKey").unwrap_or_default(),
        );
        entity.timestamp = object
            .get("Timestamp")
            .and_then(|v| v.as_str())
            .and_then(parse_datetime);
        entity.odata = ODataAnnotations {
            metadata: string_field("odata.metadata"),
            type_name: string_field("odata.type"),
            id: string_field("odata.id"),
            etag: string_field("odata.etag"),
            edit_link: string_field("odata.editLink"),
        };

        for (key, value) in &object {
            if key.starts_with("odata.")
                || key.contains("@odata.")
                || matches!(key.as_str(), "PartitionKey" | "RowKey" | "Timestamp")
                || value.is_null()
            {
                continue;
            }

            let edm_type = object
                .get(&format!("{}@odata.type", key))
                .and_then(|v| v.as_str());
            let typed = EntityValue::from_json(key, value, edm_type)?;
            entity.properties.insert(key.clone(), typed);
        }

        Ok(entity)
    }

    /// Keep only the named properties
    pub fn project(&mut self, select: &[String]) {
        self.properties.retain(|name, _| select.iter().any(|s| s == name));
    }

    pub fn get(&self, name: &str) -> Option<&EntityValue> {
        self.properties.get(name)
    }

    fn require(&self, name: &str) -> Result<&EntityValue> {
        self.get(name)
            .ok_or_else(|| StorageError::property_missing(name))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            EntityValue::String(s) => Ok(s),
            other => Err(StorageError::type_mismatch(name, "Edm.String", other.type_name())),
        }
    }

    pub fn get_i32(&self, name: &str) -> Result<i32> {
        match self.require(name)? {
            EntityValue::Int32(n) => Ok(*n),
            other => Err(StorageError::type_mismatch(name, "Edm.Int32", other.type_name())),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            EntityValue::Int64(n) => Ok(*n),
            EntityValue::Int32(n) => Ok(i64::from(*n)),
            other => Err(StorageError::type_mismatch(name, "Edm.Int64", other.type_name())),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            EntityValue::Double(n) => Ok(*n),
            other => Err(StorageError::type_mismatch(name, "Edm.Double", other.type_name())),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            EntityValue::Boolean(b) => Ok(*b),
            other => Err(StorageError::type_mismatch(name, "Edm.Boolean", other.type_name())),
        }
    }

    pub fn get_datetime(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.require(name)? {
            EntityValue::DateTime(dt) => Ok(*dt),
            other => Err(StorageError::type_mismatch(name, "Edm.DateTime", other.type_name())),
        }
    }
}
