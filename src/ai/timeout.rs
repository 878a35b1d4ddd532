//! Timeout Helpers
//!
//! Wraps a request attempt in `tokio::time::timeout` and maps expiry onto a
//! transient [`LlmError`].

use std::future::Future;
use std::time::Duration;

use crate::types::LlmError;

/// Timeout for a single request attempt.
///
/// Expiry is reported as a transient error so the attempt loop may retry it.
pub async fn attempt_with_timeout<T, F>(
    timeout: Duration,
    future: F,
) -> std::result::Result<T, LlmError>
where
    F: Future<Output = std::result::Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::transient(format!(
            "request timed out after {:.1}s",
            timeout.as_secs_f64()
        ))),
    }
}
