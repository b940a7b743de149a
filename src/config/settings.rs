//! Configuration settings management
//!
//! This module handles loading configuration from defaults, an optional
//! file and the environment, and validating it before use.

use crate::error::{Result, StorageError};
use crate::table::MetadataLevel;
use crate::utils::helpers::validate_account_name;
use crate::utils::retry::RetryOptions;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

const MIB: usize = 1024 * 1024;

/// Which credential is used to authorize requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Account name plus account key (Shared Key)
    SharedKey,
    /// Azure AD token from DefaultAzureCredential
    Default,
}

impl std::str::FromStr for AuthMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "shared_key" | "sharedkey" | "key" => Ok(Self::SharedKey),
            "default" | "defaultazurecredential" | "token" => Ok(Self::Default),
            other => Err(StorageError::config(format!(
                "Unsupported authentication mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub container_prefix: String,
    pub endpoint: Option<String>,
    pub block_size_mb: usize,
    pub max_concurrent_uploads: usize,
    pub max_single_put_size_mb: usize,
    pub download_retries: usize,
    pub work_dir: Option<PathBuf>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            container_prefix: "quickstart-".to_string(),
            endpoint: None,
            block_size_mb: 4,
            max_concurrent_uploads: 16,
            max_single_put_size_mb: 256,
            download_retries: 3,
            work_dir: None,
        }
    }
}

impl BlobConfig {
    pub fn block_size(&self) -> usize {
        self.block_size_mb.saturating_mul(MIB)
    }

    pub fn max_single_put_size(&self) -> u64 {
        (self.max_single_put_size_mb as u64).saturating_mul(MIB as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub table_name: String,
    pub endpoint: Option<String>,
    pub partition_key: String,
    pub row_key: String,
    pub select: Vec<String>,
    pub property: String,
    pub metadata: MetadataLevel,
    pub timeout_secs: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            endpoint: None,
            partition_key: "PartitionKey".to_string(),
            row_key: "RowKey".to_string(),
            select: vec!["one property".to_string()],
            property: "one property".to_string(),
            metadata: MetadataLevel::Full,
            timeout_secs: 30,
        }
    }
}

impl TableConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    pub account_name: String,
    pub account_key: Zeroizing<String>,
    pub auth_mode: AuthMode,
    pub endpoint_suffix: String,
    pub retry: RetryOptions,
    pub blob: BlobConfig,
    pub table: TableConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("auth_mode", &self.auth_mode)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("retry", &self.retry)
            .field("blob", &self.blob)
            .field("table", &self.table)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            account_name: String::new(),
            account_key: Zeroizing::new(String::new()),
            auth_mode: AuthMode::SharedKey,
            endpoint_suffix: "core.windows.net".to_string(),
            retry: RetryOptions::default(),
            blob: BlobConfig::default(),
            table: TableConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.account_name.is_empty() {
            return Err(StorageError::config(
                "Storage account name is required (set AZURE_STORAGE_ACCOUNT)",
            ));
        }
        validate_account_name(&self.account_name)?;

        if self.auth_mode == AuthMode::SharedKey {
            if self.account_key.is_empty() {
                return Err(StorageError::config(
                    "Storage account key is required for shared key authentication (set AZURE_STORAGE_KEY)",
                ));
            }
            BASE64.decode(self.account_key.as_bytes()).map_err(|e| {
                StorageError::config(format!("Storage account key is not valid base64: {}", e))
            })?;
        }

        if self.blob.block_size_mb == 0 {
            return Err(StorageError::config("block_size_mb must be greater than zero"));
        }
        if self.blob.block_size_mb.checked_mul(MIB).is_none() {
            return Err(StorageError::config(format!(
                "block_size_mb of {} is too large",
                self.blob.block_size_mb
            )));
        }
        if self.blob.max_single_put_size_mb.checked_mul(MIB).is_none() {
            return Err(StorageError::config(format!(
                "max_single_put_size_mb of {} is too large",
                self.blob.max_single_put_size_mb
            )));
        }

        if self.blob.max_concurrent_uploads == 0 {
            return Err(StorageError::config(
                "max_concurrent_uploads must be greater than zero",
            ));
        }

        if self.table.timeout_secs == 0 {
            return Err(StorageError::config("timeout_secs must be greater than zero"));
        }

        Ok(())
    }

    /// Checks only the table workflow needs
    pub fn validate_table(&self) -> Result<()> {
        if self.table.table_name.trim().is_empty() {
            return Err(StorageError::config(
                "Table name is required (set AZURE_STORAGE_TABLE or --table)",
            ));
        }
        if self.table.property.trim().is_empty() {
            return Err(StorageError::config("A property to print is required"));
        }
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        // Use XDG Base Directory specification on Linux and macOS
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            use std::env;
            let config_dir = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg_config_home)
            } else {
                let home_dir = env::var("HOME")
                    .map_err(|_| StorageError::config("HOME environment variable not set"))?;
                PathBuf::from(home_dir).join(".config")
            };
            Ok(config_dir.join("storage-quickstart").join("config.toml"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let config_dir = dirs::config_dir()
                .ok_or_else(|| StorageError::config("Unable to determine config directory"))?;
            Ok(config_dir.join("storage-quickstart").join("config.toml"))
        }
    }

    /// Service endpoint, e.g. `https://myaccount.blob.core.windows.net`
    pub fn blob_endpoint(&self) -> String {
        self.blob
            .endpoint
            .clone()
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                format!("https://{}.blob.{}", self.account_name, self.endpoint_suffix)
            })
    }

    pub fn table_endpoint(&self) -> String {
        self.table
            .endpoint
            .clone()
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                format!("https://{}.table.{}", self.account_name, self.endpoint_suffix)
            })
    }
}

/// Load configuration from multiple sources with priority order:
/// 1. Command-line flags (applied by the binaries afterwards)
/// 2. Environment variables
/// 3. Configuration file
/// 4. Default values
///
/// Validation is left to the caller so flags can still change the result.
pub async fn load_config_no_validation(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StorageError::config(format!(
                    "Configuration file '{}' does not exist",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => Config::get_config_path()?,
    };
    if config_path.exists() {
        tracing::debug!(path = %config_path.display(), "loading configuration file");
        config = load_from_file(&config_path).await?;
    }

    load_from_env(&mut config)?;

    Ok(config)
}

async fn load_from_file(path: &Path) -> Result<Config> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_config(&contents)
}

/// Parse configuration text: TOML first, then JSON as fallback
pub fn parse_config(contents: &str) -> Result<Config> {
    match toml::from_str::<Config>(contents) {
        Ok(config) => Ok(config),
        Err(toml_error) => serde_json::from_str::<Config>(contents).map_err(|_| {
            StorageError::serialization(format!("Invalid configuration file: {}", toml_error))
        }),
    }
}

fn load_from_env(config: &mut Config) -> Result<()> {
    apply_env(config, |key| std::env::var(key).ok())
}

/// Apply environment overrides using `lookup` to read variables
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("DEBUG") {
        config.debug = value.to_lowercase() == "true" || value == "1";
    }

    if let Some(value) = lookup("AZURE_STORAGE_ACCOUNT") {
        config.account_name = value;
    }

    if let Some(value) = lookup("AZURE_STORAGE_KEY") {
        config.account_key = Zeroizing::new(value);
    }

    if let Some(value) = lookup("AZURE_STORAGE_AUTH") {
        config.auth_mode = value.parse()?;
    }

    if let Some(value) = lookup("AZURE_STORAGE_ENDPOINT_SUFFIX") {
        config.endpoint_suffix = value;
    }

    if let Some(value) = lookup("AZURE_STORAGE_BLOB_ENDPOINT") {
        config.blob.endpoint = Some(value);
    }

    if let Some(value) = lookup("AZURE_STORAGE_TABLE_ENDPOINT") {
        config.table.endpoint = Some(value);
    }

    if let Some(value) = lookup("AZURE_STORAGE_TABLE") {
        config.table.table_name = value;
    }

    if let Some(value) = lookup("BLOB_BLOCK_SIZE_MB") {
        if let Ok(size) = value.parse::<usize>() {
            config.blob.block_size_mb = size;
        }
    }

    if let Some(value) = lookup("BLOB_MAX_CONCURRENT_UPLOADS") {
        if let Ok(max_uploads) = value.parse::<usize>() {
            config.blob.max_concurrent_uploads = max_uploads;
        }
    }

    Ok(())
}
