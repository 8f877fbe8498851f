use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::classification::ErrorClassification;
use super::types::SiftError;

impl ErrorClassification {
    /// Calculate the retry delay for this error classification based on the
    /// current attempt number (0-indexed).
    ///
    /// - RateLimitError: 10s + (attempt * 10s), capped at 60s
    /// - Default: exponential backoff 2^attempt + random jitter (0-1s), capped at 30s
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        match self.error_type {
            "RateLimitError" => {
                let secs = 10 + (attempt as u64 * 10);
                Duration::from_secs(secs.min(60))
            }
            _ => {
                let base: f64 = 2.0_f64.powi(attempt as i32);
                let jitter: f64 = rand::random::<f64>();
                let secs = (base + jitter).min(30.0);
                Duration::from_secs_f64(secs)
            }
        }
    }
}

/// Execute an async operation, retrying retryable errors with exponential
/// backoff until the total time budget is exhausted. Non-retryable errors
/// fail immediately.
pub async fn with_backoff<F, Fut, T>(
    operation_name: &str,
    budget: Duration,
    mut factory: F,
) -> Result<T, SiftError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SiftError>>,
{
    let started = tokio::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();
                if !classification.retryable {
                    warn!(
                        operation = operation_name,
                        error_type = classification.error_type,
                        "Non-retryable error, failing immediately"
                    );
                    return Err(e);
                }

                let delay = classification.retry_delay(attempt);
                if started.elapsed() + delay > budget {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        budget_secs = budget.as_secs(),
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error_type = classification.error_type,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
