//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (flight search, email dispatch, quote API):
//!     → http.rs (classify status / transport failure)
//!     → retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (exponential delay + jitter, capped)
//! ```
//!
//! # Design Decisions
//! - Every retry loop is bounded by `max_retries`
//! - One classification per error type via `Retryable`
//! - Jittered backoff prevents thundering herd
//! - Cancellation stops both the attempt and the sleep

pub mod backoff;
pub mod http;
pub mod retries;

pub use backoff::{PolicyError, RetryPolicy};
pub use http::{fetch_json_with_retry, fetch_with_cancellation, fetch_with_retry, HttpError};
pub use retries::{retry, retry_if, retry_transient, RetryError, Retrier, Retryable};
