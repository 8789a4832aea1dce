//! Quote API end to end: routing, status mapping and version conflicts.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use booking_core::config::ServiceConfig;
use booking_core::resilience::{fetch_json_with_retry, fetch_with_retry, HttpError, RetryError};
use booking_core::storage::MemoryDatabase;
use booking_core::Shutdown;

mod common;

async fn call(router: &Router, method: Method, uri: &str, agent: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(agent) = agent {
        builder = builder.header("x-agent-id", agent);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(router: &Router) -> Value {
    let (status, quote) = call(
        router,
        Method::POST,
        "/api/v1/quotes",
        Some("agent-1"),
        Some(json!({
            "agent_id": "agent-1",
            "title": "Patagonia trek",
            "client_email": "client@example.com",
            "total_cents": 760000,
            "currency": "usd"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    quote
}

#[tokio::test]
async fn test_health() {
    let router = common::test_server().await.router();
    let (status, body) = call(&router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let router = common::test_server().await.router();
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_create_then_read() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;

    assert_eq!(quote["status"], "DRAFT");
    assert_eq!(quote["version"], 1);
    assert_eq!(quote["currency"], "USD");

    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());
    let (status, fetched) = call(&router, Method::GET, &uri, Some("agent-1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, quote);
}

#[tokio::test]
async fn test_stale_update_is_conflict() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;
    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());

    let first = json!({ "expected_version": 1, "patch": { "title": "Patagonia, extended" } });
    let (status, updated) = call(&router, Method::PATCH, &uri, Some("agent-1"), Some(first)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);

    let stale = json!({ "expected_version": 1, "patch": { "title": "Overwritten" } });
    let (status, error) = call(&router, Method::PATCH, &uri, Some("agent-1"), Some(stale)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "VERSION_CONFLICT");
    assert_eq!(error["message"], "Someone else updated this record — please refresh");
    assert_eq!(error["details"]["expected_version"], 1);
    assert_eq!(error["details"]["actual_version"], 2);

    let (_, stored) = call(&router, Method::GET, &uri, None, None).await;
    assert_eq!(stored["title"], "Patagonia, extended");
}

#[tokio::test]
async fn test_sent_quote_is_locked() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;
    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());

    let (status, sent) = call(
        &router,
        Method::POST,
        &format!("{}/send", uri),
        Some("agent-1"),
        Some(json!({ "expected_version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["status"], "SENT");
    assert!(sent["sent_at"].is_string());

    let (status, error) = call(
        &router,
        Method::POST,
        &format!("{}/send", uri),
        Some("agent-1"),
        Some(json!({ "expected_version": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "ALREADY_SENT");
    assert_eq!(error["message"], "This quote was already sent");

    let patch = json!({ "expected_version": 2, "patch": { "notes": "late edit" } });
    let (status, error) = call(&router, Method::PATCH, &uri, Some("agent-1"), Some(patch)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "INVALID_STATE");
    assert_eq!(error["details"]["current_status"], "SENT");
    assert_eq!(error["details"]["allowed_status"], "DRAFT");
}

#[tokio::test]
async fn test_other_agent_is_forbidden() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;
    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());

    let (status, error) = call(&router, Method::GET, &uri, Some("agent-2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], "FORBIDDEN");

    let (status, _) = call(
        &router,
        Method::DELETE,
        &format!("{}?expected_version=1", uri),
        Some("agent-2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_and_missing() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;
    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());

    let (status, _) = call(&router, Method::DELETE, &format!("{}?expected_version=1", uri), Some("agent-1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, error) = call(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_validation_and_references() {
    let router = common::test_server().await.router();

    let (status, error) = call(
        &router,
        Method::POST,
        "/api/v1/quotes",
        None,
        Some(json!({ "agent_id": "agent-1", "title": "", "client_email": "c@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert_eq!(error["details"]["field"], "title");

    let (status, error) = call(
        &router,
        Method::POST,
        "/api/v1/quotes",
        None,
        Some(json!({ "agent_id": "nobody", "title": "Oslo", "client_email": "c@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["code"], "DANGLING_REFERENCE");

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/quotes",
        Some("agent-2"),
        Some(json!({ "agent_id": "agent-1", "title": "Oslo", "client_email": "c@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rejected_requests_use_error_body() {
    let router = common::test_server().await.router();
    let quote = create(&router).await;
    let uri = format!("/api/v1/quotes/{}", quote["id"].as_str().unwrap());

    let (status, error) = call(&router, Method::PATCH, &uri, Some("agent-1"), Some(json!({ "patch": {} }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "VALIDATION_FAILED");
    assert!(error["message"].as_str().unwrap().contains("expected_version"));

    let (status, error) = call(&router, Method::GET, "/api/v1/quotes/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_PATH");

    let (status, error) = call(&router, Method::DELETE, &uri, Some("agent-1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_QUERY");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/quotes")
                .header("content-type", "application/json")
                .body(Body::from("{bad json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["code"], "MALFORMED_JSON");
}

#[tokio::test]
async fn test_replayed_create_with_reference_is_duplicate() {
    let router = common::test_server().await.router();
    let body = json!({
        "agent_id": "agent-1",
        "title": "Lofoten",
        "client_email": "c@example.com",
        "reference": "Q-REPLAY01"
    });

    let (status, quote) = call(&router, Method::POST, "/api/v1/quotes", Some("agent-1"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(quote["reference"], "Q-REPLAY01");

    let (status, error) = call(&router, Method::POST, "/api/v1/quotes", Some("agent-1"), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "DUPLICATE");
    assert_eq!(error["details"]["constraint"], "quotes_reference_key");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_read_retries() {
    let db = Arc::new(MemoryDatabase::new());
    let shutdown = Shutdown::new();
    // One-second base delay: without cancellation the read backs off for 3s.
    let router = common::server_with(db.clone(), ServiceConfig::default(), shutdown.clone())
        .await
        .router();
    db.set_online(false);

    let started = tokio::time::Instant::now();
    let read = tokio::spawn(async move {
        let uri = format!("/api/v1/quotes/{}", uuid::Uuid::new_v4());
        call(&router, Method::GET, &uri, Some("agent-1"), None).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    let (status, error) = read.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_live_server_concurrent_writers() {
    let (addr, shutdown) = common::spawn_server().await;
    let client = common::client();
    let policy = common::fast_policy(3);
    let base = format!("http://{}/api/v1/quotes", addr);

    let create = client
        .post(&base)
        .header("x-agent-id", "agent-1")
        .json(&json!({ "agent_id": "agent-1", "title": "Bali", "client_email": "c@example.com" }))
        .build()
        .unwrap();
    let quote: Value = fetch_json_with_retry(&client, create, &policy).await.unwrap();
    let uri = format!("{}/{}", base, quote["id"].as_str().unwrap());

    let patch = |title: &str| {
        client
            .patch(&uri)
            .header("x-agent-id", "agent-1")
            .json(&json!({ "expected_version": 1, "patch": { "title": title } }))
            .build()
            .unwrap()
    };
    let (a, b) = tokio::join!(
        fetch_with_retry(&client, patch("caller A"), &policy),
        fetch_with_retry(&client, patch("caller B"), &policy),
    );

    let results = [a, b];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let conflict = results.into_iter().find_map(Result::err).unwrap();
    // 409 is terminal: one attempt, no retry.
    assert!(matches!(
        conflict,
        RetryError::Aborted {
            attempts: 1,
            error: HttpError::Status { status: 409 }
        }
    ));

    shutdown.trigger();
}
