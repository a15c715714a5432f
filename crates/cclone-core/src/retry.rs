//! Bounded retry with exponential backoff for transient failures.

use std::thread;
use std::time::Duration;

use crate::errors::Result;

/// How many times to attempt an operation and how long to back off
/// between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }
}

/// Invoke `operation` until it succeeds, fails with a non-transient error,
/// or exhausts `policy.max_attempts`. Sleeps
/// `initial_delay * backoff_factor^n` after the n-th transient failure.
pub fn with_retry<T, F>(mut operation: F, policy: &RetryPolicy) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_transient() || attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy
                    .initial_delay
                    .mul_f64(policy.backoff_factor.powi(attempt as i32 - 1));
                log::debug!(
                    "transient failure (attempt {attempt}/{}), retrying in {delay:?}: {err}",
                    policy.max_attempts
                );
                thread::sleep(delay);
            }
        }
    }
}
