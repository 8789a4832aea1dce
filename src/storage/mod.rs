//! Transactional persistence for versioned records.
//!
//! # Data Flow
//! ```text
//! QuoteGuard operation
//!     → atomic.rs run_atomic (begin with max-wait, run work with deadline)
//!     → Database::begin → Tx: QuoteStore (reads + staged writes)
//!     → Ok  → Database::commit (publish staged writes)
//!     → Err → drop Tx (rollback, nothing visible)
//!     → error.rs (DbError → CoreError)
//! ```
//!
//! # Design Decisions
//! - The executor owns commit/rollback; work closures never commit
//! - Isolation is delegated to the backend; no locking above it
//! - Backends report `DbError`; only the executor boundary sees `CoreError`

pub mod atomic;
pub mod error;
pub mod memory;

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::quoting::types::{Agent, Quote};

pub use atomic::{run_atomic, run_with_retry, TxFuture, DEFAULT_TRANSACTION_TIMEOUT};
pub use error::DbError;
pub use memory::{MemoryDatabase, MemoryTransaction};

/// Reads and writes available inside an open transaction.
///
/// Writes are only visible to other transactions after commit.
pub trait QuoteStore: Send {
    fn find_agent(&self, id: &str) -> Result<Option<Agent>, DbError>;
    fn insert_agent(&mut self, agent: Agent) -> Result<(), DbError>;
    fn find_quote(&self, id: Uuid) -> Result<Option<Quote>, DbError>;
    fn insert_quote(&mut self, quote: Quote) -> Result<(), DbError>;
    fn update_quote(&mut self, quote: Quote) -> Result<(), DbError>;
    /// Returns whether a row was removed.
    fn delete_quote(&mut self, id: Uuid) -> Result<bool, DbError>;
}

/// A backend able to open and commit transactions.
///
/// Dropping a transaction without committing it rolls it back.
pub trait Database: Send + Sync {
    type Tx: QuoteStore;

    /// Open a transaction, waiting at most `max_wait` to acquire it.
    fn begin(&self, max_wait: Duration) -> impl Future<Output = Result<Self::Tx, DbError>> + Send;

    fn commit(&self, tx: Self::Tx) -> impl Future<Output = Result<(), DbError>> + Send;
}
