//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared with the server, guard and retry policies
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; no hot reload
//! - Every field has a default, so an empty file is a valid config
//! - Validation reports every problem at once rather than the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DatabaseConfig, HttpClientConfig, ObservabilityConfig, RetryConfig, ServerConfig, ServiceConfig};
