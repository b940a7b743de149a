//! Retry logic with exponential backoff
//!
//! This module provides configurable retry functionality with
//! exponential backoff for handling transient failures.

use crate::error::{Result, StorageError};
use crate::utils::network::is_retryable_error;
use azure_core::ExponentialRetryOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub max_retries: usize,
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Options that never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let mut interval = self.initial_interval;
        for _ in 1..attempt {
            interval = std::cmp::min(
                Duration::from_secs_f64(interval.as_secs_f64() * self.multiplier),
                self.max_interval,
            );
        }
        std::cmp::min(interval, self.max_interval)
    }

    /// Same policy for the Azure SDK pipeline
    pub fn to_sdk(&self) -> azure_core::RetryOptions {
        if self.max_retries == 0 {
            return azure_core::RetryOptions::none();
        }
        azure_core::RetryOptions::exponential(self.sdk_exponential())
    }

    fn sdk_exponential(&self) -> ExponentialRetryOptions {
        ExponentialRetryOptions::default()
            .max_retries(u32::try_from(self.max_retries).unwrap_or(u32::MAX))
            .initial_delay(self.initial_interval)
            .max_delay(self.max_interval)
    }
}

pub async fn retry_with_backoff<T, F, Fut>(mut operation: F, options: &RetryOptions) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=options.max_retries {
        if attempt > 0 {
            let delay = options.delay_for(attempt);
            tracing::debug!(attempt, ?delay, "retrying after transient failure");
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !is_retryable_error(&error) {
                    return Err(error);
                }

                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| StorageError::unknown("Retry failed with no error")))
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
