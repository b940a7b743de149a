//! Shared Key signing for table requests
//!
//! The table service uses the shorter Shared Key scheme: verb, Content-MD5,
//! Content-Type, date and the canonicalized resource.
//! Reference: https://learn.microsoft.com/rest/api/storageservices/authorize-with-shared-key

use crate::error::Result;
use azure_core::auth::Secret;
use azure_core::hmac::hmac_sha256;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Table service resources only carry the `comp` parameter
pub fn table_canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(name, _)| name == "comp") {
        resource.push_str(&format!("?comp={}", comp));
    }
    resource
}

pub fn table_string_to_sign(account: &str, method: &Method, url: &Url, headers: &HeaderMap) -> String {
    // x-ms-date goes in the Date position
    let date = match header_str(headers, "x-ms-date") {
        "" => header_str(headers, "date"),
        date => date,
    };

    [
        method.as_str(),
        header_str(headers, "content-md5"),
        header_str(headers, "content-type"),
        date,
        &table_canonicalized_resource(account, url),
    ]
    .join("\n")
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the base64 account key
pub fn sign(key: &Secret, string_to_sign: &str) -> Result<String> {
    Ok(hmac_sha256(string_to_sign, key)?)
}
