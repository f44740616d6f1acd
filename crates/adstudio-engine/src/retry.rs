use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::config::env_f64;
use crate::error::GenerationError;

/// Exponential backoff for calls to the generation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// `ADSTUDIO_RETRY_ATTEMPTS` (1..=10) and `ADSTUDIO_RETRY_DELAY_MS` (0..=60000).
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            max_attempts: env_f64(
                "ADSTUDIO_RETRY_ATTEMPTS",
                base.max_attempts as f64,
                1.0,
                10.0,
            )
            .round() as u32,
            initial_delay: Duration::from_millis(
                env_f64(
                    "ADSTUDIO_RETRY_DELAY_MS",
                    base.initial_delay.as_millis() as f64,
                    0.0,
                    60_000.0,
                )
                .round() as u64,
            ),
        }
    }

    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
        }
    }

    /// Wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `on_retry(attempt, delay, err)` fires before each wait.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T>,
        mut on_retry: impl FnMut(u32, Duration, &anyhow::Error),
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retryable(&err) || attempt + 1 >= attempts {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    log::info!(
                        "retry attempt {}/{} after {}ms: {err:#}",
                        attempt + 1,
                        attempts,
                        delay.as_millis()
                    );
                    on_retry(attempt, delay, &err);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Safety blocks and credential problems are returned immediately.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    let typed_fatal = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<GenerationError>(),
            Some(GenerationError::Blocked(_) | GenerationError::Authentication(_))
        )
    });
    if typed_fatal {
        return false;
    }
    let text = format!("{err:#}");
    !(text.contains("API Key") || text.contains("authentication"))
}
