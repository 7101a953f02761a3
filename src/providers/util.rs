use crate::core::valuation::coerce_number;
use anyhow::{Error, anyhow};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Sends a request with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning the send future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// Transport errors and 5xx responses are retried. Any other non-success
/// status fails immediately.
///
/// # Returns
/// Either the successful response or the error after all attempts
pub async fn send_with_retry<F, Fut>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<reqwest::Response, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        let err = match operation().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let err = anyhow!("HTTP {} {}", status.as_u16(), body.trim());
                if !status.is_server_error() {
                    return Err(err);
                }
                err
            }
            Err(e) => Error::from(e),
        };

        if attempt > retries {
            return Err(err);
        }
        debug!(
            "Attempt {}/{} failed: {}. Retrying...",
            attempt, retries, err
        );
        attempt += 1;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// Deserializes a number that providers may send as a number, a numeric
/// string, `null` or garbage. Anything non-finite becomes `None`.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_number))
}

/// Like [`lenient_f64`], keeping only non-negative whole numbers.
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value
        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32))
}
