//! Retry execution engine

use std::error::Error;
use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Builder for a [`RetryExecutor`]
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
    cancel: Option<CancellationToken>,
}

impl Default for RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            jitter: false,
            cancel: None,
        }
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide per error whether another attempt is worthwhile
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
            cancel: self.cancel,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
            cancel: self.cancel,
        }
    }

    /// Add up to 25% random delay on top of the policy delay. Disabled by default.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Stop waiting and give up as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            jitter: self.jitter,
            cancel: self.cancel,
        }
    }
}

/// A retry executor with configurable policy, predicate, observer and cancellation
pub struct RetryExecutor<P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
    cancel: Option<CancellationToken>,
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `op` until it succeeds, the policy is exhausted, the
    /// predicate rejects an error, or the token is cancelled
    ///
    /// An attempt already in flight is never interrupted; cancellation is
    /// checked before each attempt and during backoff sleeps.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let mut last_error: Option<E> = None;
        let mut attempts_made = 0;

        for attempt in 1..=self.policy.max_attempts {
            if self.is_cancelled() {
                self.observer.on_cancelled(attempts_made, None);
                return Err(RetryError::cancelled(attempts_made, last_error));
            }

            self.observer
                .on_attempt_start(attempt, self.policy.max_attempts);
            attempts_made = attempt;

            match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => {
                    if !self.predicate.should_retry(&err) {
                        self.observer.on_cancelled(attempt, Some(&err));
                        return Err(RetryError::non_retryable(attempt, err));
                    }

                    if attempt >= self.policy.max_attempts {
                        self.observer.on_exhausted(attempt, &err);
                        return Err(RetryError::exhausted(attempt, err, start.elapsed()));
                    }

                    let delay = calculate_delay(&self.policy, attempt, self.jitter);
                    self.observer.on_attempt_failed(attempt, &err, delay);
                    last_error = Some(err);

                    if !delay.is_zero() && !self.sleep(delay).await {
                        self.observer.on_cancelled(attempt, None);
                        return Err(RetryError::cancelled(attempt, last_error));
                    }
                }
            }
        }

        // Only reachable with max_attempts == 0
        Err(RetryError::cancelled(attempts_made, last_error))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Sleep for `delay`; returns false if cancelled first
    async fn sleep(&self, delay: std::time::Duration) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
