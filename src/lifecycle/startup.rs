//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the database and quote guard from configuration
//! - Register seed agents
//! - Bind the listener last (traffic only when ready)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Re-registering an existing seed agent is not an error

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::error::{CoreError, PersistenceFailure};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::quoting::types::Agent;
use crate::quoting::QuoteGuard;
use crate::storage::{Database, MemoryDatabase};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to register agent '{agent}': {source}")]
    Seed { agent: String, source: CoreError },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: std::io::Error },
}

/// Register `agents`, skipping ones that already exist.
pub async fn seed_agents<D: Database>(guard: &QuoteGuard<D>, agents: &[Agent]) -> Result<usize, StartupError> {
    let mut registered = 0;
    for agent in agents {
        match guard.register_agent(agent.clone()).await {
            Ok(_) => registered += 1,
            Err(CoreError::PersistenceFailed(PersistenceFailure::Duplicate { .. })) => {
                tracing::debug!(agent_id = %agent.id, "Agent already registered");
            }
            Err(source) => {
                return Err(StartupError::Seed {
                    agent: agent.id.clone(),
                    source,
                })
            }
        }
    }
    Ok(registered)
}

/// Build the server and bind its listener. The server stops on `shutdown`.
pub async fn prepare(config: ServiceConfig, shutdown: Shutdown) -> Result<(HttpServer, TcpListener), StartupError> {
    let guard = QuoteGuard::new(Arc::new(MemoryDatabase::new()))
        .with_timeout(config.database.transaction_timeout());

    let registered = seed_agents(&guard, &config.database.agents).await?;
    tracing::info!(registered, "Seed agents registered");

    let address = config.server.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    Ok((HttpServer::new(config, guard, shutdown), listener))
}
