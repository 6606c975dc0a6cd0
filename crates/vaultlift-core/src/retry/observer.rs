//! Retry observation and logging

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Callbacks fired during retry execution
///
/// Attempt numbers are 1-indexed.
pub trait RetryObserver: Send + Sync {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// An attempt failed and the next one starts after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration);

    fn on_success(&self, attempt: u32, total_duration: Duration);

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error);

    /// Retrying stopped early: non-retryable error or cancellation
    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        let _ = (attempt, error);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Error, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Error) {}
}

/// Logs retry events with `tracing`
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO after a retry, DEBUG on the first attempt
/// - `on_exhausted`: ERROR
/// - `on_cancelled`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt,
            max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        tracing::error!(
            operation = %self.operation,
            attempts,
            error = %final_error,
            "all retry attempts exhausted"
        );
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        match error {
            Some(err) => tracing::warn!(
                operation = %self.operation,
                attempt,
                error = %err,
                "retry stopped"
            ),
            None => tracing::warn!(operation = %self.operation, attempt, "retry cancelled"),
        }
    }
}

/// Collects counters and backoff delays; used by tests and summaries
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    cancellations: AtomicU32,
    delays: Mutex<Vec<Duration>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Backoff delays announced between attempts, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Error, delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Error) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempt: u32, _error: Option<&dyn Error>) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        (**self).on_cancelled(attempt, error)
    }
}

/// Fan out events to two observers
impl<A: RetryObserver, B: RetryObserver> RetryObserver for (A, B) {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        self.0.on_attempt_start(attempt, max_attempts);
        self.1.on_attempt_start(attempt, max_attempts);
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        self.0.on_attempt_failed(attempt, error, delay);
        self.1.on_attempt_failed(attempt, error, delay);
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        self.0.on_success(attempt, total_duration);
        self.1.on_success(attempt, total_duration);
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        self.0.on_exhausted(attempts, final_error);
        self.1.on_exhausted(attempts, final_error);
    }

    fn on_cancelled(&self, attempt: u32, error: Option<&dyn Error>) {
        self.0.on_cancelled(attempt, error);
        self.1.on_cancelled(attempt, error);
    }
}
