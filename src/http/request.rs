//! Request extraction.
//!
//! # Responsibilities
//! - Identify the acting agent from the `x-agent-id` header
//! - Define the JSON bodies and query strings the quote routes accept
//! - Wrap axum's `Json`, `Path` and `Query` so their rejections render as
//!   the same JSON error body as every other failure
//!
//! # Design Decisions
//! - Request ID is assigned by the outermost layer, before tracing
//! - A missing `x-agent-id` means "no acting agent", not an error;
//!   ownership checks then pass

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::quoting::types::QuotePatch;

pub const X_AGENT_ID: &str = "x-agent-id";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Agent on whose behalf the request is made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActingAgent(pub Option<String>);

impl ActingAgent {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ActingAgent {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(X_AGENT_ID) else {
            return Ok(ActingAgent(None));
        };
        let agent = value
            .to_str()
            .map_err(|_| ApiError::bad_request("x-agent-id header is not valid text"))?
            .trim();
        if agent.is_empty() {
            return Err(ApiError::bad_request("x-agent-id header is empty"));
        }
        Ok(ActingAgent(Some(agent.to_owned())))
    }
}

/// JSON body extractor rejecting with [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Path parameter extractor rejecting with [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// Query string extractor rejecting with [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// Body of `PATCH /api/v1/quotes/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateQuoteBody {
    pub expected_version: u64,
    #[serde(default)]
    pub patch: QuotePatch,
}

/// Body of `POST /api/v1/quotes/{id}/send`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendQuoteBody {
    pub expected_version: u64,
}

/// Query of `DELETE /api/v1/quotes/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionQuery {
    pub expected_version: u64,
}
