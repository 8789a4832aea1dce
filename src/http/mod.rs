//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (acting agent, bodies)
//!     → quotes.rs (handlers → QuoteGuard)
//!     → response.rs (CoreError → status + JSON body)
//!     → Send to client
//! ```

pub mod middleware;
pub mod quotes;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ActingAgent, ApiJson, ApiPath, ApiQuery, X_AGENT_ID, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
