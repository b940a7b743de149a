use crate::error::{Result, ServiceCode, StorageError};
use reqwest::Client;
use std::time::Duration;

/// Configuration for HTTP client with proper timeouts
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("storage-quickstart/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client.
///
/// No overall request timeout is set: the blob workflow uses a non-expiring
/// context and the table reader applies its own deadline per call.
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| StorageError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a reqwest error into a storage error, keeping timeouts distinct
pub fn classify_network_error(error: reqwest::Error, url: &str) -> StorageError {
    let host = extract_host(url);

    if error.is_timeout() {
        return StorageError::timeout(format!("Request to '{}' timed out", host));
    }

    if error.is_connect() {
        return StorageError::network(format!(
            "Failed to connect to '{}'. Please check the account name and your network connection: {}",
            host, error
        ));
    }

    if error.is_body() || error.is_decode() {
        return StorageError::network(format!(
            "Connection to '{}' failed while reading the response body: {}",
            host, error
        ));
    }

    StorageError::network(format!("Network error when accessing '{}': {}", host, error))
}

fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Check if an error is transient and the request may be repeated
pub fn is_retryable_error(error: &StorageError) -> bool {
    match error {
        StorageError::Timeout(_) => true,
        StorageError::NetworkError(_) => true,
        StorageError::ServiceError { status, code, .. } => {
            matches!(status, 500 | 502 | 503 | 504)
                || matches!(
                    code,
                    ServiceCode::ServerBusy
                        | ServiceCode::InternalError
                        | ServiceCode::OperationTimedOut
                )
        }
        StorageError::IoError(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        _ => false,
    }
}
