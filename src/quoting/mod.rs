//! Quote lifecycle.
//!
//! # Data Flow
//! ```text
//! HTTP handler / CLI
//!     → guard.rs (ownership, transition, version checks in one transaction)
//!     → state.rs (status transition table)
//!     → storage (atomic executor + QuoteStore)
//! ```
//!
//! # Design Decisions
//! - `QuoteGuard` is the only path that mutates a quote
//! - Versions increase by exactly one per successful mutation
//! - Conflicts surface to the caller; re-reading and retrying is their call

pub mod guard;
pub mod state;
pub mod types;

pub use guard::QuoteGuard;
pub use types::{Agent, NewQuote, Operation, Quote, QuotePatch, QuoteStatus};
