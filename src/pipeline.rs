//! Request pipeline for the table REST backend
//!
//! Every request goes through the same steps: stamp `x-ms-date` and
//! `x-ms-version`, authorize, send, turn non-success responses into
//! [`StorageError::ServiceError`], and repeat transient failures with backoff.

use crate::auth::StorageAuthProvider;
use crate::error::{first_line, Result, ServiceCode, StorageError};
use crate::utils::network::classify_network_error;
use crate::utils::retry::{retry_with_backoff, RetryOptions};
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// REST API version sent with every request
pub const STORAGE_API_VERSION: &str = "2021-08-06";

pub struct HttpPipeline {
    client: Client,
    auth: Arc<dyn StorageAuthProvider>,
    retry: RetryOptions,
}

impl HttpPipeline {
    pub fn new(client: Client, auth: Arc<dyn StorageAuthProvider>, retry: RetryOptions) -> Self {
        Self {
            client,
            auth,
            retry,
        }
    }

    pub fn account_name(&self) -> &str {
        self.auth.account_name()
    }

    /// Build, sign and send a request, retrying transient failures.
    ///
    /// `build` is called once per attempt so every attempt is freshly dated
    /// and signed.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let build = &build;
        retry_with_backoff(move || self.send_once(build), &self.retry).await
    }

    async fn send_once<F>(&self, build: &F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut request = build(&self.client)
            .header("x-ms-date", rfc1123_now())
            .header("x-ms-version", STORAGE_API_VERSION)
            .build()
            .map_err(|e| StorageError::invalid_argument(format!("Failed to build request: {}", e)))?;

        self.auth.authorize(&mut request).await?;

        let url = request.url().to_string();
        debug!(
            method = %request.method(),
            url = %redact_query(request.url()),
            "sending table request"
        );

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| classify_network_error(e, &url))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(service_error(response).await)
        }
    }
}

/// Current time in the RFC 1123 format the service expects
pub fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Convert an unsuccessful response into a service error
pub async fn service_error(response: Response) -> StorageError {
    let status = response.status().as_u16();
    let header_code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = response.text().await.unwrap_or_default();

    service_error_from_parts(status, header_code.as_deref(), &body)
}

/// Build a service error from a status, the `x-ms-error-code` header and the
/// body. The header code takes precedence over a code found in the body.
pub fn service_error_from_parts(status: u16, header_code: Option<&str>, body: &str) -> StorageError {
    let (body_code, message) = parse_error_body(body);
    let code = header_code
        .map(ServiceCode::from)
        .or_else(|| body_code.as_deref().map(ServiceCode::from))
        .unwrap_or_else(|| ServiceCode::Other(status.to_string()));
    let message = message.unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unexpected response")
            .to_string()
    });

    StorageError::service(status, code, message)
}

/// Extract `(code, message)` from a table JSON error body
pub fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let body = body.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return (None, None);
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = value.get("odata.error").or_else(|| value.get("error"));
        if let Some(error) = error {
            let code = error
                .get("code")
                .and_then(|c| c.as_str())
                .map(|s| s.to_string());
            let message = error
                .get("message")
                .and_then(|m| m.get("value").or(Some(m)))
                .and_then(|m| m.as_str())
                .map(first_line);
            return (code, message);
        }
    }

    (None, Some(first_line(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_json_error() {
        let body = r#"{"odata.error":{"code":"ResourceNotFound","message":{"lang":"en-US","value":"The specified resource does not exist.\nRequestId:abc"}}}"#;
        let (code, message) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("ResourceNotFound"));
        assert_eq!(message.as_deref(), Some("The specified resource does not exist."));
    }

    #[test]
    fn test_parse_unstructured_error() {
        assert_eq!(parse_error_body(""), (None, None));
        assert_eq!(
            parse_error_body("Bad Gateway"),
            (None, Some("Bad Gateway".to_string()))
        );
    }

    #[test]
    fn test_error_code_header_wins_over_body() {
        let body = r#"{"odata.error":{"code":"InvalidInput","message":{"value":"One of the request inputs is not valid."}}}"#;
        let error = service_error_from_parts(409, Some("TableAlreadyExists"), body);

        assert_eq!(error.status(), Some(409));
        assert_eq!(
            error.service_code(),
            Some(&ServiceCode::Other("TableAlreadyExists".to_string()))
        );
        assert!(error.to_string().contains("One of the request inputs is not valid."));
    }

    #[test]
    fn test_body_code_used_without_header() {
        let body = r#"{"odata.error":{"code":"ResourceNotFound","message":{"value":"gone"}}}"#;
        let error = service_error_from_parts(404, None, body);
        assert_eq!(error.service_code(), Some(&ServiceCode::ResourceNotFound));
        assert!(error.is_not_found());

        let bare = service_error_from_parts(503, None, "");
        assert_eq!(bare.service_code(), Some(&ServiceCode::Other("503".to_string())));
        assert!(bare.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_rfc1123_format() {
        let now = rfc1123_now();
        assert!(now.ends_with(" GMT"));
        assert!(chrono::DateTime::parse_from_rfc2822(&now).is_ok());
    }

    #[test]
    fn test_redact_query_drops_parameters() {
        let url = Url::parse("https://a.table.core.windows.net/people?$select=secret").unwrap();
        assert_eq!(redact_query(&url), "https://a.table.core.windows.net/people");
    }
}
