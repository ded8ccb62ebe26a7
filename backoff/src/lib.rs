//! Fixed-delay retry of fallible async operations.
//!
//! Schema changes in a Cassandra-family cluster propagate asynchronously, so
//! the common transient failure is "statement raced a DDL that has not
//! reached every node yet". Retrying after a fixed pause masks that window.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::dbg_macro
)]

use observability_deps::tracing::warn;
use snafu::Snafu;
use std::future::Future;
use std::time::Duration;

/// Error returned by [`Retry::retry`] once every attempt has failed.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[snafu(display("'{task_name}' failed after {attempts} attempts: {source}"))]
    Exhausted {
        task_name: String,
        attempts: usize,
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts that were made before giving up.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Consumes the error, returning the error of the final attempt.
    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } => source,
        }
    }
}

/// Result of a bounded retry.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Retry policy: how often and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,

    /// Pause between two consecutive attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

/// Drives an async operation through a [`RetryConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    /// Create a new driver for the given policy.
    pub fn new(config: &RetryConfig) -> Self {
        Self { config: *config }
    }

    /// Runs `do_stuff` until it succeeds or `max_attempts` is reached,
    /// sleeping `retry_delay` between attempts.
    ///
    /// Failed attempts are logged at `warn` level with the task name.
    pub async fn retry<F, F1, B, E>(&self, task_name: &str, mut do_stuff: F) -> RetryResult<B, E>
    where
        F: (FnMut() -> F1) + Send,
        F1: Future<Output = Result<B, E>> + Send,
        E: std::error::Error + Send + 'static,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match do_stuff().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= max_attempts => {
                    return Err(RetryError::Exhausted {
                        task_name: task_name.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        task_name,
                        attempt,
                        "request failed, retrying after delay"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Runs `do_stuff` until it succeeds, sleeping `retry_delay` between
    /// attempts. Never returns an error.
    pub async fn retry_forever<F, F1, B, E>(&self, task_name: &str, mut do_stuff: F) -> B
    where
        F: (FnMut() -> F1) + Send,
        F1: Future<Output = Result<B, E>> + Send,
        E: std::error::Error + Send + 'static,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match do_stuff().await {
                Ok(v) => return v,
                Err(e) => {
                    warn!(
                        error = %e,
                        task_name,
                        attempt,
                        "request failed, retrying after delay"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}
