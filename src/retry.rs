//! Retry with deadline-bounded, full-jitter exponential backoff.
//!
//! The formula here is deliberately full-jitter (`sleep(rand([0, 2*base)))`,
//! `base = initial_delay * multiplier^(attempt-1)`), not the centered-jitter
//! variant you'll see in other backoff implementations: it avoids
//! correlated retries across many concurrent callers better than jitter
//! centered on the exponential curve does.

use crate::error::{Error, ProviderError, ProviderErrorKind, NetworkErrorKind};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// `attempt` is 1-based (the delay before the *next* try after the
    /// `attempt`-th failure). Full jitter: uniform in `[0, 2*base)`.
    fn base_delay_ms(&self, attempt: u32) -> f64 {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        base.min(self.max_delay.as_millis() as f64)
    }

    pub fn full_jitter_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms(attempt);
        let sampled = rand::random::<f64>() * 2.0 * base;
        Duration::from_millis(sampled.max(0.0) as u64)
    }
}

/// Determines whether a [`ProviderError`] should be retried, per the exact
/// kind list in spec §4.5/§6. `:unprocessed` is treated as retryable — an
/// explicit judgement call, see DESIGN.md.
pub fn is_retryable(error: &ProviderError) -> bool {
    match &error.kind {
        ProviderErrorKind::Http(code) => matches!(code, 408 | 429 | 500 | 502 | 503 | 504),
        ProviderErrorKind::Named(_) => true,
        ProviderErrorKind::Network(kind) => matches!(
            kind,
            NetworkErrorKind::ConnectionRefused
                | NetworkErrorKind::Closed
                | NetworkErrorKind::Timeout
                | NetworkErrorKind::Unprocessed
        ),
        ProviderErrorKind::Other => false,
    }
}

/// Runs `operation` under a deadline-bounded, full-jitter retry loop.
///
/// `deadline` bounds the entire call including all sleeps: if the full
/// jitter sleep for the next attempt would finish at or after the
/// deadline, retries are abandoned and the last error is returned
/// immediately rather than sleeping past the deadline. `streamed_any`
/// lets the caller disable retries entirely once a streaming call has
/// already emitted chunks (never retry a stream that produced output).
pub async fn retry_provider_call<F, Fut, T>(
    config: &RetryConfig,
    deadline: Instant,
    mut streamed_any: impl FnMut() -> bool,
    mut operation: F,
) -> std::result::Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retries_remain = attempt < config.max_attempts;
                let retryable = is_retryable(&err);
                if !retries_remain || !retryable || streamed_any() {
                    return Err(err);
                }

                let delay = config.full_jitter_delay(attempt);
                let now = Instant::now();
                if now + delay >= deadline {
                    return Err(err);
                }
                sleep(delay).await;
            }
        }
    }
}

/// Generic non-provider retry helper kept for callers that want simple
/// attempt-count-bounded retrying without deadline semantics (e.g. tests,
/// or one-shot scheduler runs that have no external deadline).
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, mut operation: F) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                last_error = Some(err);
                if attempt < config.max_attempts {
                    sleep(config.full_jitter_delay(attempt)).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::other("Retry failed with no error")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_jitter_is_bounded_by_twice_base() {
        let config = RetryConfig::new().with_initial_delay(Duration::from_millis(100));
        for _ in 0..50 {
            let d = config.full_jitter_delay(1);
            assert!(d.as_millis() <= 200);
        }
    }

    #[test]
    fn base_delay_grows_exponentially() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);
        assert_eq!(config.base_delay_ms(1), 100.0);
        assert_eq!(config.base_delay_ms(2), 200.0);
        assert_eq!(config.base_delay_ms(3), 400.0);
    }

    #[test]
    fn is_retryable_matches_exact_http_codes() {
        assert!(is_retryable(&ProviderError::parse("HTTP 429: slow down")));
        assert!(is_retryable(&ProviderError::parse("HTTP 500: oops")));
        assert!(!is_retryable(&ProviderError::parse("HTTP 400: bad request")));
    }

    #[test]
    fn is_retryable_matches_named_kinds() {
        assert!(is_retryable(&ProviderError::parse("rate_limit_error: slow down")));
        assert!(!is_retryable(&ProviderError::parse("validation_error: nope")));
    }

    #[tokio::test]
    async fn retry_provider_call_succeeds_after_retryable_failure() {
        let config = RetryConfig::new().with_max_attempts(3).with_initial_delay(Duration::from_millis(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        let call_count = std::sync::atomic::AtomicUsize::new(0);
        let result = retry_provider_call(&config, deadline, || false, || {
            let n = call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::parse("rate_limit_error: slow down"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_provider_call_never_retries_after_stream_chunks() {
        let config = RetryConfig::new().with_max_attempts(3).with_initial_delay(Duration::from_millis(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        let result: std::result::Result<i32, _> = retry_provider_call(&config, deadline, || true, || async {
            Err(ProviderError::parse("rate_limit_error: slow down"))
        })
        .await;
        assert!(result.is_err());
    }
}
