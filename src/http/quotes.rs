use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::http::request::{ActingAgent, ApiJson, ApiPath, ApiQuery, SendQuoteBody, UpdateQuoteBody, VersionQuery};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::quoting::state::check_owner;
use crate::quoting::types::{NewQuote, Quote};
use crate::storage::run_with_retry;

pub async fn create_quote(
    State(state): State<AppState>,
    agent: ActingAgent,
    ApiJson(new_quote): ApiJson<NewQuote>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    if let Some(acting) = agent.as_deref() {
        if acting != new_quote.agent_id {
            return Err(CoreError::Forbidden {
                reason: format!("agent '{}' cannot create quotes for '{}'", acting, new_quote.agent_id),
            }
            .into());
        }
    }

    let quote = state.guard.create_quote(new_quote).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// Reads are idempotent, so transient storage failures are retried here
/// until the server starts shutting down.
pub async fn get_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    agent: ActingAgent,
) -> Result<Json<Quote>, ApiError> {
    let guard = &state.guard;
    let cancel = Some(state.shutdown.token());
    let quote = run_with_retry(state.read_retries, state.read_base_delay, cancel, || guard.get_quote(id)).await?;
    check_owner(&quote, agent.as_deref())?;
    Ok(Json(quote))
}

pub async fn update_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    agent: ActingAgent,
    ApiJson(body): ApiJson<UpdateQuoteBody>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state
        .guard
        .update_with_version(id, body.expected_version, body.patch, agent.as_deref())
        .await?;
    Ok(Json(quote))
}

pub async fn send_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    agent: ActingAgent,
    ApiJson(body): ApiJson<SendQuoteBody>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state.guard.send_quote(id, body.expected_version, agent.as_deref()).await?;
    Ok(Json(quote))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<VersionQuery>,
    agent: ActingAgent,
) -> Result<StatusCode, ApiError> {
    state.guard.delete_quote(id, query.expected_version, agent.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
