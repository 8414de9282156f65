//! Bounded retry with exponential backoff for completion calls.

use std::future::Future;
use std::time::Duration;

use crate::llm::LLMError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Final result of a retried operation plus the number of attempts made.
#[derive(Debug)]
pub struct Outcome<T> {
    pub result: Result<T, LLMError>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32, error: &LLMError) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let hinted = match error {
            LLMError::RateLimited { retry_after_ms } => Duration::from_millis(*retry_after_ms),
            _ => Duration::ZERO,
        };
        exponential.max(hinted).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Outcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Outcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err) if err.is_transient() && attempt <= self.max_retries => {
                    let delay = self.backoff(attempt, &err);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient completion failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Outcome {
                        result: Err(err),
                        attempts: attempt,
                    }
                }
            }
        }
    }
}
