//! Booking Core Service (v1)
//!
//! Quote API built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                 BOOKING CORE                   │
//!     Client Request   │  ┌─────────┐    ┌──────────┐    ┌───────────┐  │
//!     ─────────────────┼─▶│  http   │───▶│ quoting  │───▶│  storage  │  │
//!                      │  │ server  │    │  guard   │    │  atomic   │  │
//!                      │  └─────────┘    └──────────┘    └───────────┘  │
//!                      │                                                │
//!                      │  ┌──────────────────────────────────────────┐  │
//!                      │  │          Cross-Cutting Concerns           │  │
//!                      │  │  config │ observability │ lifecycle       │  │
//!                      │  │  resilience (backoff / retry / http)      │  │
//!                      │  └──────────────────────────────────────────┘  │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use booking_core::config::{load_config, ServiceConfig};
use booking_core::lifecycle::{signals, startup, Shutdown};
use booking_core::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "booking-core")]
#[command(about = "Quote API with optimistic concurrency and retrying storage", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "booking-core starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        transaction_timeout_ms = config.database.transaction_timeout_ms,
        seed_agents = config.database.agents.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let (server, listener) = startup::prepare(config, shutdown.clone()).await?;
    signals::spawn_signal_handler(shutdown);

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
