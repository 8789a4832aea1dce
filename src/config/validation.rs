//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the retry section yields a usable backoff policy
//! - Detect duplicate seed agents
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if let Err(err) = config.retry.to_policy().validate() {
        errors.push(ValidationError::new("retry", err.to_string()));
    }

    if config.http_client.timeout_secs == 0 {
        errors.push(ValidationError::new("http_client.timeout_secs", "must be greater than 0"));
    }

    if config.database.transaction_timeout_ms == 0 {
        errors.push(ValidationError::new("database.transaction_timeout_ms", "must be greater than 0"));
    }
    if config.database.max_retries == 0 {
        errors.push(ValidationError::new("database.max_retries", "must be at least 1"));
    }
    let mut seen = HashSet::new();
    for agent in &config.database.agents {
        if agent.id.trim().is_empty() {
            errors.push(ValidationError::new("database.agents", "agent id must not be empty"));
        } else if !seen.insert(agent.id.as_str()) {
            errors.push(ValidationError::new(
                "database.agents",
                format!("duplicate agent id '{}'", agent.id),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
