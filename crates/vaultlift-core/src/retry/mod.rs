//! Retry execution engine with policy-based configuration
//!
//! Used for every network operation that may be retried (object uploads,
//! container existence checks). Secret fetches are deliberately single-shot
//! and never go through this module.
//!
//! # Features
//!
//! - Retry strategies: None, Fixed, Exponential, Linear backoff
//! - Delays never decrease from one attempt to the next and are capped
//! - Observable retry attempts via the `RetryObserver` trait
//! - Backoff sleeps are interrupted by a `CancellationToken`
//!
//! # Example
//!
//! ```rust,no_run
//! use vaultlift_core::retry::{RetryError, RetryExecutorBuilder, TracingObserver};
//! use vaultlift_core::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("upload"))
//!         .build()
//!         .execute(|| async { Ok("done".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, NeverRetry, RetryPredicate};
