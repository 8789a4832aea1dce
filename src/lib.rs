//! Booking Core Library
//!
//! Resilience primitives for a travel booking backend: a backoff retrier,
//! an HTTP retry wrapper, an optimistic concurrency guard for quotes and an
//! atomic transaction executor, plus the HTTP service exposing them.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod quoting;
pub mod resilience;
pub mod storage;

pub use config::schema::ServiceConfig;
pub use error::{CoreError, CoreResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use quoting::QuoteGuard;
pub use resilience::{fetch_with_retry, retry, retry_if, RetryError, RetryPolicy, Retrier, Retryable};
pub use storage::{run_atomic, run_with_retry, Database, MemoryDatabase};
