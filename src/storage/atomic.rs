//! Atomic transaction executor.
//!
//! `run_atomic` runs a unit of work inside one transaction: every write
//! commits together or none do. Acquiring the transaction and running the
//! work are each bounded by the same timeout; exceeding either rolls back and
//! surfaces [`CoreError::DatabaseTimeout`].

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult, PersistenceFailure};
use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::retries::{RetryError, Retrier};
use crate::storage::Database;

/// Bound on both transaction acquisition and execution when callers do not
/// pick one.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Future returned by a unit of work borrowing the open transaction.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = CoreResult<T>> + Send + 't>>;

/// Run `work` inside a single transaction.
///
/// Commits when `work` returns `Ok`. On any error, or when `timeout`
/// elapses, the transaction is dropped and nothing it wrote is visible.
///
/// ```ignore
/// let quote = run_atomic(&db, DEFAULT_TRANSACTION_TIMEOUT, |tx| {
///     Box::pin(async move {
///         tx.insert_quote(quote.clone())?;
///         Ok(quote)
///     })
/// })
/// .await?;
/// ```
pub async fn run_atomic<D, T, F>(db: &D, timeout: Duration, work: F) -> CoreResult<T>
where
    D: Database,
    F: for<'t> FnOnce(&'t mut D::Tx) -> TxFuture<'t, T> + Send,
{
    let started = Instant::now();
    let result = execute(db, timeout, work).await;

    match &result {
        Ok(_) => metrics::record_transaction("committed", started),
        Err(err) => {
            let outcome = match err {
                CoreError::DatabaseTimeout { .. } => "timeout",
                CoreError::PersistenceFailed(PersistenceFailure::Unavailable(_)) => "unavailable",
                _ => "rolled_back",
            };
            tracing::debug!(outcome, error = %err, "Transaction rolled back");
            metrics::record_transaction(outcome, started);
        }
    }
    result
}

async fn execute<D, T, F>(db: &D, timeout: Duration, work: F) -> CoreResult<T>
where
    D: Database,
    F: for<'t> FnOnce(&'t mut D::Tx) -> TxFuture<'t, T> + Send,
{
    let mut tx = db.begin(timeout).await?;

    let value = match tokio::time::timeout(timeout, work(&mut tx)).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Transaction exceeded its timeout");
            return Err(CoreError::DatabaseTimeout { timeout });
        }
    };

    db.commit(tx).await?;
    Ok(value)
}

/// Retry `operation` with exponential backoff, doubling from `base_delay`.
///
/// Constraint and required-field violations, and domain rejections such as
/// version conflicts, are returned on the first occurrence. Timeouts and
/// unavailable backends are retried up to `max_retries` attempts.
///
/// When `cancel` fires, the current attempt or backoff sleep is abandoned
/// and [`RetryError::Cancelled`] is returned.
pub async fn run_with_retry<F, Fut, T>(
    max_retries: u32,
    base_delay: Duration,
    cancel: Option<CancellationToken>,
    operation: F,
) -> Result<T, RetryError<CoreError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    // Doubling is never capped below the last attempt's delay.
    let ceiling = base_delay.saturating_mul(2u32.saturating_pow(max_retries.min(31)));
    let policy = RetryPolicy::new(max_retries, base_delay, ceiling, 2.0);

    let mut retrier = Retrier::new(&policy).named("database");
    if let Some(token) = cancel {
        retrier = retrier.with_cancellation(token);
    }
    retrier.run_transient(operation).await
}
