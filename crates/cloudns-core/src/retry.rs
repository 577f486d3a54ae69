//! Bounded exponential backoff with cancellation
//!
//! [`retry`] wraps any fallible async unit of work. The cancellation token is
//! checked before every attempt and every wait, and the wait itself is
//! interrupted by it; a cancelled call always surfaces [`Error::Cancelled`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Attempt budget and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_backoff: Duration,
    /// Upper bound for any single wait
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// A single attempt, no waiting
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.attempts(),
            config.initial_backoff(),
            config.max_backoff(),
        )
    }
}

/// Run `op` until it succeeds, the attempt budget runs out, or `cancel` fires
///
/// Failures other than the last are followed by a wait that starts at
/// `initial_backoff` and doubles up to `max_backoff`. Exhaustion yields
/// [`Error::RetriesExhausted`] wrapping the last failure. A failure that is
/// itself a cancellation is returned as-is, without further attempts.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, cancel: &CancellationToken, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = op() => result,
        };

        let err = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Operation succeeded on attempt {}/{}", attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => err,
        };

        if attempt == max_attempts {
            warn!("Attempt {}/{} failed, giving up: {}", attempt, max_attempts, err);
            return Err(Error::RetriesExhausted {
                attempts: max_attempts,
                source: Box::new(err),
            });
        }

        warn!(
            "Attempt {}/{} failed, retrying in {:?}: {}",
            attempt, max_attempts, backoff, err
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }

        backoff = backoff.saturating_mul(2).min(policy.max_backoff);
    }

    // max_attempts >= 1, so the loop always returns
    Err(Error::Other("retry loop ended without an attempt".to_string()))
}
