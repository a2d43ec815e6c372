//! Bounded retry with a pluggable delay policy.

use std::{future::Future, time::Duration};

use tracing::debug;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayPolicy {
    /// Same delay between every pair of attempts.
    Fixed(Duration),
    /// `base * 2^(n-1)` after the n-th failed attempt, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl DelayPolicy {
    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            DelayPolicy::Fixed(delay) => delay,
            DelayPolicy::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: DelayPolicy,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay: DelayPolicy::Fixed(delay),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

/// Runs `action` until it succeeds, `should_retry` rejects the error, or
/// `policy.max_attempts` is reached. The action gets the 1-based attempt
/// number. Returns the first success or the last failure.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut action: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && should_retry(&err) => {
                let delay = policy.delay.delay_after(attempt);
                debug!(attempt, max_attempts, ?delay, error = %err, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
