//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke a fallible async operation up to `max_retries` times
//! - Sleep between attempts following the policy's backoff curve
//! - Consult a retryability predicate before spending another attempt
//! - Stop immediately when an external cancellation token fires
//!
//! # Design Decisions
//! - Attempts are strictly sequential; nothing is shared between calls
//! - Classification lives on the error type (`Retryable`), one per taxonomy
//! - The `on_retry` hook returns `()`; a panic inside it is not caught

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;

/// Classification of an error as transient (worth another attempt) or terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Terminal outcome of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed. Carries the most recent error.
    #[error("Operation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The error was classified as non-retryable and returned unchanged.
    #[error("{error}")]
    Aborted { attempts: u32, error: E },

    /// The cancellation token fired before the operation succeeded.
    #[error("Operation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last_error: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of attempts started before the retrier gave up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Aborted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The most recent underlying error, if any attempt completed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

type RetryHook<'a, E> = Box<dyn FnMut(u32, &E) + Send + 'a>;

/// Configurable retry loop.
///
/// ```ignore
/// let quote = Retrier::new(&policy)
///     .named("flight_search")
///     .on_retry(|attempt, err| tracing::info!(attempt, %err, "search retry"))
///     .with_cancellation(token)
///     .run(|| client.search(&params))
///     .await?;
/// ```
pub struct Retrier<'a, E> {
    policy: &'a RetryPolicy,
    operation: &'static str,
    on_retry: Option<RetryHook<'a, E>>,
    cancel: Option<CancellationToken>,
}

impl<'a, E: Display> Retrier<'a, E> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            operation: "operation",
            on_retry: None,
            cancel: None,
        }
    }

    /// Label used in logs and metrics.
    pub fn named(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    /// Hook invoked with the 1-based upcoming attempt number and the error
    /// that just occurred, before each backoff sleep.
    pub fn on_retry(mut self, hook: impl FnMut(u32, &E) + Send + 'a) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// Abort both the in-flight attempt and the backoff sleep when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Retry on every failure.
    pub async fn run<F, Fut, T>(self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(op, |_, _| true).await
    }

    /// Retry only the failures the error type classifies as transient.
    pub async fn run_transient<F, Fut, T>(self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        self.run_if(op, |err, _| err.is_retryable()).await
    }

    /// Retry while `should_retry(error, attempt_index)` holds.
    ///
    /// A rejected error is returned at once as [`RetryError::Aborted`],
    /// without sleeping and without spending the remaining attempts.
    pub async fn run_if<F, Fut, T, P>(mut self, mut op: F, mut should_retry: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E, u32) -> bool,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempts = 0u32;
        let mut last_error: Option<E> = None;

        loop {
            attempts += 1;

            let result = match self.cancel.as_ref() {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled { attempts, last_error });
                    }
                    result = op() => result,
                },
                None => op().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::debug!(operation = self.operation, attempts, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let attempt_index = attempts - 1;
            if !should_retry(&error, attempt_index) {
                tracing::debug!(
                    operation = self.operation,
                    attempt = attempts,
                    error = %error,
                    "Non-retryable failure"
                );
                return Err(RetryError::Aborted { attempts, error });
            }

            if attempts >= max_attempts {
                tracing::warn!(
                    operation = self.operation,
                    attempts,
                    error = %error,
                    "Retries exhausted"
                );
                metrics::record_retry_exhausted(self.operation);
                return Err(RetryError::Exhausted {
                    attempts,
                    last_error: error,
                });
            }

            let delay = self.policy.delay(attempt_index);
            if let Some(hook) = self.on_retry.as_mut() {
                hook(attempts + 1, &error);
            }
            tracing::warn!(
                operation = self.operation,
                attempt = attempts,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            metrics::record_retry_attempt(self.operation);

            match self.cancel.as_ref() {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled {
                            attempts,
                            last_error: Some(error),
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                },
                None => tokio::time::sleep(delay).await,
            }

            last_error = Some(error);
        }
    }
}

/// Retry `op` on any failure under `policy`.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    Retrier::new(policy).run(op).await
}

/// Retry `op` while `should_retry(error, attempt_index)` holds.
pub async fn retry_if<F, Fut, T, E, P>(policy: &RetryPolicy, op: F, should_retry: P) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: FnMut(&E, u32) -> bool,
{
    Retrier::new(policy).run_if(op, should_retry).await
}

/// Retry `op` on the failures its error type classifies as transient.
pub async fn retry_transient<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Retryable,
{
    Retrier::new(policy).run_transient(op).await
}
