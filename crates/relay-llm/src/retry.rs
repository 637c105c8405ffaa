//! Classified, bounded exponential backoff for idempotent calls (§4.C).

use relay_core::SdkError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    fn should_retry(&self, error: &SdkError) -> bool {
        if error.is_retryable() {
            return true;
        }
        matches!(error, SdkError::Provider(p) if p
            .status_code
            .map(|code| self.retryable_status_codes.contains(&code))
            .unwrap_or(false))
    }

    /// Delay before attempt `n` (0-indexed), honoring a provider-supplied
    /// `Retry-After` floor when present.
    fn delay_for(&self, attempt: u32, error: &SdkError) -> Duration {
        let computed = (self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32))
            .min(self.max_delay_ms as f64) as u64;
        let floor = error.retry_after_ms().unwrap_or(0);
        Duration::from_millis(computed.max(floor))
    }
}

/// Retries `f` up to `policy.max_retries` additional times. Only the
/// non-streaming call path uses this — streams never retry past their
/// first yielded event (§4.C, §9).
pub async fn retry_call<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T, SdkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SdkError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_retries || !policy.should_retry(&error) {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt, &error);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after classified error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{ProviderError, ProviderErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_retryable_errors_up_to_the_limit() {
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 2,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), SdkError> = retry_call(&policy, || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::Provider(ProviderError::new(
                    "test",
                    ProviderErrorKind::RateLimit,
                    "slow down",
                )))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), SdkError> = retry_call(&policy, || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::Provider(ProviderError::new(
                    "test",
                    ProviderErrorKind::Authentication,
                    "bad key",
                )))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 2,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = retry_call(&policy, || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(SdkError::Provider(ProviderError::new(
                        "test",
                        ProviderErrorKind::Server,
                        "unavailable",
                    )))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn delay_respects_retry_after_floor() {
        let policy = RetryPolicy::default();
        let error = SdkError::Provider(
            ProviderError::new("test", ProviderErrorKind::RateLimit, "slow down").with_retry_after_ms(5_000),
        );
        assert_eq!(policy.delay_for(0, &error), Duration::from_millis(5_000));
    }
}
