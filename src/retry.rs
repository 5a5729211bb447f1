use backoff::{Error as BackoffError, ExponentialBackoff};
use std::time::Duration;
use tracing::warn;

/// Retry policy for venue snapshot fetches.
///
/// Relay submission is never routed through this: resubmitting the same
/// serialized bytes after the blockhash window is guaranteed to fail.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn to_exponential_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        }
    }

    /// Retry an async operation with exponential backoff
    pub async fn retry_async<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let backoff = self.to_exponential_backoff();

        let retry_operation = || {
            let fut = operation();
            async {
                match fut.await {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        warn!("Operation failed, will retry: {}", e);
                        Err(BackoffError::transient(e))
                    }
                }
            }
        };

        backoff::future::retry(backoff, retry_operation).await
    }
}
