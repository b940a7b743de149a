use azure_core::error::ErrorKind;
use std::fmt;
use thiserror::Error;

/// Structured error code reported by the storage service.
///
/// Only the codes the quickstarts react to are named; everything else is
/// kept verbatim in [`ServiceCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCode {
    ContainerAlreadyExists,
    ContainerNotFound,
    ContainerBeingDeleted,
    BlobNotFound,
    ConditionNotMet,
    ResourceNotFound,
    TableNotFound,
    AuthenticationFailed,
    AuthorizationFailure,
    OperationTimedOut,
    ServerBusy,
    InternalError,
    InvalidInput,
    Other(String),
}

impl ServiceCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContainerAlreadyExists => "ContainerAlreadyExists",
            Self::ContainerNotFound => "ContainerNotFound",
            Self::ContainerBeingDeleted => "ContainerBeingDeleted",
            Self::BlobNotFound => "BlobNotFound",
            Self::ConditionNotMet => "ConditionNotMet",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::TableNotFound => "TableNotFound",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AuthorizationFailure => "AuthorizationFailure",
            Self::OperationTimedOut => "OperationTimedOut",
            Self::ServerBusy => "ServerBusy",
            Self::InternalError => "InternalError",
            Self::InvalidInput => "InvalidInput",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for ServiceCode {
    fn from(code: &str) -> Self {
        match code {
            "ContainerAlreadyExists" => Self::ContainerAlreadyExists,
            "ContainerNotFound" => Self::ContainerNotFound,
            "ContainerBeingDeleted" => Self::ContainerBeingDeleted,
            "BlobNotFound" => Self::BlobNotFound,
            "ConditionNotMet" => Self::ConditionNotMet,
            "ResourceNotFound" => Self::ResourceNotFound,
            "TableNotFound" => Self::TableNotFound,
            "AuthenticationFailed" => Self::AuthenticationFailed,
            "AuthorizationFailure" => Self::AuthorizationFailure,
            "OperationTimedOut" => Self::OperationTimedOut,
            "ServerBusy" => Self::ServerBusy,
            "InternalError" => Self::InternalError,
            "InvalidInput" => Self::InvalidInput,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for storage quickstart operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Storage service error (HTTP {status}, {code}): {message}")]
    ServiceError {
        status: u16,
        code: ServiceCode,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Property '{name}' is not present on the entity")]
    PropertyMissing { name: String },

    #[error("Property '{name}' has type {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Azure SDK error: {0}")]
    AzureError(azure_core::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// How the quickstart workflows treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Logged and treated as success.
    Benign(&'static str),
    /// Aborts the workflow.
    Fatal,
}

impl StorageError {
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn service<S: Into<String>>(status: u16, code: ServiceCode, message: S) -> Self {
        Self::ServiceError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn property_missing<S: Into<String>>(name: S) -> Self {
        Self::PropertyMissing { name: name.into() }
    }

    pub fn type_mismatch<S: Into<String>>(name: S, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        Self::Unknown(msg.into())
    }

    /// Service error code, if this error came back from the storage service
    pub fn service_code(&self) -> Option<&ServiceCode> {
        match self {
            Self::ServiceError { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServiceError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
            || self.service_code() == Some(&ServiceCode::OperationTimedOut)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.service_code(),
            Some(
                ServiceCode::ContainerNotFound
                    | ServiceCode::BlobNotFound
                    | ServiceCode::ResourceNotFound
                    | ServiceCode::TableNotFound
            )
        ) || self.status() == Some(404)
    }

    /// Classify this error for the quickstart workflows.
    ///
    /// Exactly one service code is benign: the container already existing.
    pub fn disposition(&self) -> ErrorDisposition {
        match self.service_code() {
            Some(ServiceCode::ContainerAlreadyExists) => {
                ErrorDisposition::Benign("Received 409. Container already exists")
            }
            _ => ErrorDisposition::Fatal,
        }
    }
}

impl From<azure_core::Error> for StorageError {
    fn from(error: azure_core::Error) -> Self {
        match error.kind() {
            ErrorKind::HttpResponse { status, error_code } => {
                let status = u16::from(*status);
                let code = error_code
                    .as_deref()
                    .map(ServiceCode::from)
                    .unwrap_or_else(|| ServiceCode::Other(status.to_string()));
                let message = error
                    .as_http_error()
                    .and_then(|e| e.error_message())
                    .map(first_line)
                    .unwrap_or_else(|| first_line(&error.to_string()));
                Self::service(status, code, message)
            }
            ErrorKind::Io => Self::network(error.to_string()),
            ErrorKind::Credential => Self::authentication(error.to_string()),
            ErrorKind::DataConversion => Self::serialization(error.to_string()),
            _ => Self::AzureError(error),
        }
    }
}

// Service messages append "RequestId:...\nTime:..." lines
pub(crate) fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}

/// Result type alias for storage quickstart operations
pub type Result<T> = std::result::Result<T, StorageError>;
