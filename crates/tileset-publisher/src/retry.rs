//! Rate-limit backoff shared by every remote write.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::client::ApiResponse;
use crate::error::{PublishError, Result};

/// Retry on `429 Too Many Requests` with a doubling delay.
///
/// After `max_retries` retries the last response is returned as-is, rate
/// limited or not; callers inspect its status like any other response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial call.
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(PublishError::Config("retry base_delay must be > 0".to_string()));
        }
        if self.max_retries > 16 {
            return Err(PublishError::Config(format!(
                "max_retries {} exceeds 16",
                self.max_retries
            )));
        }
        Ok(())
    }

    /// Wait before retry number `attempt` (0-based): 2s, 4s, 8s, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Whether a response should be retried.
    pub fn is_retryable(response: &ApiResponse) -> bool {
        response.is_rate_limited()
    }

    /// Run `call` until it is not rate limited or retries are exhausted.
    ///
    /// Transport errors are returned immediately.
    pub async fn run<F, Fut>(&self, operation: &str, mut call: F) -> Result<ApiResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        let mut attempt = 0;
        loop {
            let response = call().await?;
            if !Self::is_retryable(&response) {
                return Ok(response);
            }
            if attempt >= self.max_retries {
                warn!(
                    operation,
                    retries = attempt,
                    status = response.status,
                    "Rate limit retries exhausted"
                );
                return Ok(response);
            }

            let delay = self.delay_for(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                delay_secs = delay.as_secs_f64(),
                "Rate limited (429), backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        let zero = RetryPolicy {
            base_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(PublishError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_not_rate_limited() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let response = RetryPolicy::default()
            .run("upload", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(ApiResponse::new(if n < 3 { 429 } else { 200 }, ""))
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(2 + 4 + 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_response_when_exhausted() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let response = RetryPolicy::default()
            .run("create", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ApiResponse::new(429, "slow down"))
            })
            .await
            .unwrap();

        assert_eq!(response, ApiResponse::new(429, "slow down"));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(2 + 4 + 8 + 16 + 32));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let response = RetryPolicy::default()
            .run("publish", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ApiResponse::new(401, "unauthorized"))
            })
            .await
            .unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = RetryPolicy::default()
            .run("publish", || async {
                Err::<ApiResponse, _>(PublishError::Http("connection reset".into()))
            })
            .await;
        assert!(matches!(err, Err(PublishError::Http(_))));
    }
}
