//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use booking_core::config::ServiceConfig;
use booking_core::quoting::types::Agent;
use booking_core::quoting::QuoteGuard;
use booking_core::storage::MemoryDatabase;
use booking_core::{HttpServer, RetryPolicy, Shutdown};

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the zero-based call number and returns the status and body
/// to answer with.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);
    let calls = Arc::new(AtomicU32::new(0));

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        // Drain the request head; bodies in these tests are small.
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f(call).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            408 => "408 Request Timeout",
                            409 => "409 Conflict",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend answering with `statuses` in order, then 200 forever.
/// Returns the address and a counter of calls received.
pub async fn start_scripted_backend(statuses: Vec<u16>) -> (SocketAddr, Arc<AtomicU32>) {
    let seen = Arc::new(AtomicU32::new(0));
    let counter = seen.clone();
    let statuses = Arc::new(statuses);
    let addr = start_programmable_backend(move |call| {
        counter.fetch_add(1, Ordering::SeqCst);
        let status = statuses.get(call as usize).copied().unwrap_or(200);
        async move { (status, format!("{{\"call\":{}}}", call)) }
    })
    .await;
    (addr, seen)
}

/// Policy with short real-time delays for network tests.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(10), Duration::from_millis(50), 2.0)
}

/// Non-pooled client so each attempt opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn agents() -> Vec<Agent> {
    vec![
        Agent {
            id: "agent-1".into(),
            name: "Ada".into(),
        },
        Agent {
            id: "agent-2".into(),
            name: "Grace".into(),
        },
    ]
}

/// Quote API over `db` with two seeded agents, in-process.
pub async fn server_with(db: Arc<MemoryDatabase>, config: ServiceConfig, shutdown: Shutdown) -> HttpServer {
    let guard = QuoteGuard::new(db);
    for agent in agents() {
        guard.register_agent(agent).await.unwrap();
    }
    HttpServer::new(config, guard, shutdown)
}

/// Quote API with two seeded agents and short read backoff.
pub async fn test_server() -> HttpServer {
    let mut config = ServiceConfig::default();
    config.database.base_delay_ms = 10;
    server_with(Arc::new(MemoryDatabase::new()), config, Shutdown::new()).await
}

/// Quote API served on an ephemeral port until the returned handle triggers.
pub async fn spawn_server() -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let mut config = ServiceConfig::default();
    config.database.base_delay_ms = 10;
    let server = server_with(Arc::new(MemoryDatabase::new()), config, shutdown.clone()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    (addr, shutdown)
}
