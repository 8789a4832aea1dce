//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::middleware::record_response;
use crate::http::quotes;
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::Shutdown;
use crate::quoting::QuoteGuard;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: QuoteGuard,
    /// Attempts for idempotent reads hitting transient storage failures.
    pub read_retries: u32,
    pub read_base_delay: Duration,
    /// Cancels read retries still backing off when the server shuts down.
    pub shutdown: Shutdown,
}

/// HTTP server for the quote API.
pub struct HttpServer {
    router: Router,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server that stops when `shutdown` is triggered.
    pub fn new(config: ServiceConfig, guard: QuoteGuard, shutdown: Shutdown) -> Self {
        let state = AppState {
            guard,
            read_retries: config.database.max_retries,
            read_base_delay: config.database.base_delay(),
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, shutdown }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(quotes::health))
            .route("/api/v1/quotes", post(quotes::create_quote))
            .route(
                "/api/v1/quotes/{id}",
                get(quotes::get_quote)
                    .patch(quotes::update_quote)
                    .delete(quotes::delete_quote),
            )
            .route("/api/v1/quotes/{id}/send", post(quotes::send_quote))
            .with_state(state)
            .layer(middleware::from_fn(record_response))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router with all layers, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until shutdown is triggered, then drain in-flight
    /// requests.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
