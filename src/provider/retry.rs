//! Uniform retry policy for provider calls
//!
//! One policy object, injected at the adapter boundary. Retries transient
//! failures with exponential backoff; permanent failures surface
//! immediately.

use super::traits::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// No retries, no waiting. Useful in tests.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Run `op`, retrying transient errors up to the attempt limit.
    pub async fn run<T, F, Fut>(&self, provider_id: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        provider = provider_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_retried_until_success() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::Transient("busy".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Permanent("bad key".into())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_exhausted_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Transient("still busy".into())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
