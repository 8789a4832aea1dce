//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Seed agents → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Agents are seeded before the listener binds, so the first request sees them
//! - One `Shutdown` token is shared by the signal handler and the server

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
