//! Bounded retry with backoff
//!
//! Used to wait on asynchronous remote transitions (deletion in particular).
//! The wait is bounded by a timeout budget and can be cut short through a
//! [`CancellationToken`], which is reported the same way as the budget running
//! out.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Shortest wait between attempts, whatever the configuration says
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Retry configuration for polling operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total time budget for all attempts
    pub timeout: Duration,

    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Delay ceiling; once reached every further wait uses this interval
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Fixed interval between attempts
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            initial_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait after the given (zero-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64())).max(MIN_DELAY)
    }
}

/// Why [`retry`] gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The operation failed with an error the predicate refused to retry
    Permanent(E),

    /// The budget ran out (or the wait was cancelled) while the operation was
    /// still failing with retryable errors
    TimedOut {
        attempts: u32,
        last_error: Option<E>,
    },
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryFailure::Permanent(e) => write!(f, "{}", e),
            RetryFailure::TimedOut {
                attempts,
                last_error: Some(e),
            } => write!(f, "timed out after {} attempts: {}", attempts, e),
            RetryFailure::TimedOut {
                attempts,
                last_error: None,
            } => write!(f, "timed out after {} attempts", attempts),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the budget in
/// `config` is spent.
///
/// Errors for which `is_retryable` returns `false` abort immediately. An
/// attempt already in flight when the token is cancelled is dropped.
pub async fn retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let deadline = Instant::now() + config.timeout;
    let mut attempts: u32 = 0;
    let mut last_error: Option<E> = None;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(attempts, "retry cancelled");
                return Err(RetryFailure::TimedOut { attempts, last_error });
            }
            result = operation() => result,
        };
        attempts += 1;

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(RetryFailure::Permanent(e)),
            Err(e) => last_error = Some(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(RetryFailure::TimedOut {
                attempts,
                last_error,
            });
        }

        let delay = config
            .delay_for_attempt(attempts - 1)
            .min(deadline.saturating_duration_since(now));
        tracing::debug!(attempt = attempts, ?delay, "retrying");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(attempts, "retry cancelled");
                return Err(RetryFailure::TimedOut { attempts, last_error });
            }
            _ = sleep(delay) => {}
        }
    }
}
