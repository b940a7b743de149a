//! Authentication provider trait and implementations
//!
//! This module defines the authentication provider trait used by the table
//! REST pipeline, its Shared Key and Azure AD token implementations, and the
//! credential handed to the blob SDK client.

use crate::auth::signing;
use crate::config::{AuthMode, Config};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use azure_core::auth::{Secret, TokenCredential};
use azure_identity::{DefaultAzureCredential, TokenCredentialOptions};
use azure_storage::StorageCredentials;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;

/// OAuth scope covering the blob and table data planes
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Trait for storage request authorization
#[async_trait]
pub trait StorageAuthProvider: Send + Sync {
    /// Add an `Authorization` header to a fully built request.
    ///
    /// `x-ms-date` and `x-ms-version` must already be set.
    async fn authorize(&self, request: &mut Request) -> Result<()>;

    /// Storage account the credential belongs to
    fn account_name(&self) -> &str;
}

/// Shared Key authorization from an account name and account key
pub struct SharedKeyProvider {
    account_name: String,
    key: Secret,
}

impl SharedKeyProvider {
    /// Create a new SharedKeyProvider from a base64 account key
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self> {
        let account_key = account_key.trim();
        BASE64.decode(account_key).map_err(|e| {
            StorageError::authentication(format!("Account key is not valid base64: {}", e))
        })?;

        Ok(Self {
            account_name: account_name.into(),
            key: Secret::new(account_key.to_string()),
        })
    }
}

#[async_trait]
impl StorageAuthProvider for SharedKeyProvider {
    async fn authorize(&self, request: &mut Request) -> Result<()> {
        let string_to_sign = signing::table_string_to_sign(
            &self.account_name,
            request.method(),
            request.url(),
            request.headers(),
        );
        let signature = signing::sign(&self.key, &string_to_sign)?;

        let value = HeaderValue::from_str(&format!("SharedKey {}:{}", self.account_name, signature))
            .map_err(|e| StorageError::authentication(format!("Invalid authorization header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        Ok(())
    }

    fn account_name(&self) -> &str {
        &self.account_name
    }
}

/// Bearer token authorization backed by an Azure SDK token credential
pub struct TokenCredentialProvider {
    account_name: String,
    credential: Arc<dyn TokenCredential>,
}

impl TokenCredentialProvider {
    pub fn new(account_name: impl Into<String>, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            account_name: account_name.into(),
            credential,
        }
    }

    /// Create a provider using DefaultAzureCredential
    pub fn with_default_credential(account_name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(account_name, default_credential()?))
    }
}

#[async_trait]
impl StorageAuthProvider for TokenCredentialProvider {
    async fn authorize(&self, request: &mut Request) -> Result<()> {
        let token = self
            .credential
            .get_token(&[STORAGE_SCOPE])
            .await
            .map_err(|e| StorageError::authentication(format!("Failed to get token: {}", e)))?;

        let value = HeaderValue::from_str(&format!("Bearer {}", token.token.secret()))
            .map_err(|e| StorageError::authentication(format!("Invalid token format: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        Ok(())
    }

    fn account_name(&self) -> &str {
        &self.account_name
    }
}

fn default_credential() -> Result<Arc<dyn TokenCredential>> {
    let credential = DefaultAzureCredential::create(TokenCredentialOptions::default()).map_err(|e| {
        StorageError::authentication(format!("Failed to create DefaultAzureCredential: {}", e))
    })?;
    Ok(Arc::new(credential))
}

fn require_account_key(config: &Config) -> Result<&str> {
    if config.account_key.is_empty() {
        return Err(StorageError::config(
            "account key is required for shared key authentication",
        ));
    }
    Ok(config.account_key.as_str())
}

/// Authentication provider factory
pub struct AuthProviderFactory;

impl AuthProviderFactory {
    /// Create an authentication provider based on configuration
    pub fn create_provider(config: &Config) -> Result<Arc<dyn StorageAuthProvider>> {
        match config.auth_mode {
            AuthMode::SharedKey => Ok(Arc::new(SharedKeyProvider::new(
                config.account_name.clone(),
                require_account_key(config)?,
            )?)),
            AuthMode::Default => Ok(Arc::new(TokenCredentialProvider::with_default_credential(
                config.account_name.clone(),
            )?)),
        }
    }

    /// Credentials for the blob SDK client
    pub fn storage_credentials(config: &Config) -> Result<StorageCredentials> {
        match config.auth_mode {
            AuthMode::SharedKey => {
                let key = require_account_key(config)?.trim();
                BASE64.decode(key).map_err(|e| {
                    StorageError::authentication(format!("Account key is not valid base64: {}", e))
                })?;
                Ok(StorageCredentials::access_key(
                    config.account_name.clone(),
                    Secret::new(key.to_string()),
                ))
            }
            AuthMode::Default => Ok(StorageCredentials::token_credential(default_credential()?)),
        }
    }
}
