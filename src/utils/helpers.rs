//! General utility helper functions
//!
//! Random resource names and the storage service's naming rules.

use crate::error::{Result, StorageError};
use rand::Rng;
use regex::Regex;

const MIN_CONTAINER_NAME_LENGTH: usize = 3;
const MAX_CONTAINER_NAME_LENGTH: usize = 63;

/// Random non-negative decimal number as a string
pub fn random_string() -> String {
    rand::thread_rng().gen_range(0..i64::MAX).to_string()
}

/// Build a unique container name from a prefix
pub fn unique_container_name(prefix: &str) -> Result<String> {
    let name = format!("{}{}", prefix, random_string());
    validate_container_name(&name)?;
    Ok(name)
}

/// Check a name against the blob service's container naming rules
pub fn validate_container_name(name: &str) -> Result<()> {
    if name.len() < MIN_CONTAINER_NAME_LENGTH || name.len() > MAX_CONTAINER_NAME_LENGTH {
        return Err(StorageError::invalid_argument(format!(
            "Container name '{}' must be {}-{} characters long",
            name, MIN_CONTAINER_NAME_LENGTH, MAX_CONTAINER_NAME_LENGTH
        )));
    }

    let re = Regex::new(r"^[a-z0-9](?:[a-z0-9]|-[a-z0-9])*$")
        .map_err(|e| StorageError::unknown(e.to_string()))?;
    if !re.is_match(name) {
        return Err(StorageError::invalid_argument(format!(
            "Container name '{}' may only contain lowercase letters, digits and single hyphens, \
             and must start and end with a letter or digit",
            name
        )));
    }

    Ok(())
}

/// Storage account names are 3-24 lowercase letters and digits
pub fn validate_account_name(name: &str) -> Result<()> {
    let valid = (3..=24).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StorageError::config(format!(
            "Invalid storage account name '{}': expected 3-24 lowercase letters and digits",
            name
        )))
    }
}
