//! Retry delay strategies and predicates

use crate::config::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt` is the 1-indexed attempt that just failed. For every strategy
/// the base delay is non-decreasing in `attempt`, and it is capped at
/// `max_delay_ms`. Jitter only ever adds up to 25% on top of the base delay.
///
/// ```rust
/// use vaultlift_core::retry::calculate_delay;
/// use vaultlift_core::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::LinearBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 2000,
///     max_delay_ms: 60000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 2000);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 4000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,

        RetryStrategy::FixedDelay => policy.initial_delay_ms,

        RetryStrategy::ExponentialBackoff => {
            // A multiplier below 1 would shrink the delay
            let multiplier = policy.backoff_multiplier.max(1.0).powf(attempt_index as f64);
            let delay = policy.initial_delay_ms as f64 * multiplier;
            if delay.is_finite() && delay < u64::MAX as f64 {
                delay as u64
            } else {
                u64::MAX
            }
        }

        RetryStrategy::LinearBackoff => policy
            .initial_delay_ms
            .saturating_mul(attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error should be retried
///
/// By default every error is retryable; use this to short-circuit retries
/// for errors that cannot succeed on a later attempt.
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// No error is retryable
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate backed by a closure
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}
