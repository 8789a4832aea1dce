//! Error responses.
//!
//! # Responsibilities
//! - Map every `CoreError` kind to an HTTP status code
//! - Map rejected bodies, paths and query strings to the same body
//! - Render a stable JSON error body `{ code, message, details? }`
//!
//! # Design Decisions
//! - Conflicts (stale version, forbidden transition, duplicate) are 409
//! - Timeouts and unavailable storage are 503 so clients may retry
//! - Internal messages are logged, never returned

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{CoreError, PersistenceFailure, StateViolation};
use crate::resilience::retries::RetryError;

const VERSION_CONFLICT_MESSAGE: &str = "Someone else updated this record — please refresh";
const ALREADY_SENT_MESSAGE: &str = "This quote was already sent";

/// Error returned by API handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { entity, id } => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
                    .with_details(json!({ "entity": entity, "id": id }))
            }
            CoreError::InvalidState(StateViolation::Disallowed {
                current,
                operation,
                allowed,
            }) => ApiError::new(StatusCode::CONFLICT, "INVALID_STATE", message).with_details(json!({
                "current_status": current,
                "operation": operation,
                "allowed_status": allowed,
            })),
            CoreError::InvalidState(StateViolation::AlreadySent { sent_at }) => {
                ApiError::new(StatusCode::CONFLICT, "ALREADY_SENT", ALREADY_SENT_MESSAGE).with_details(json!({ "sent_at": sent_at }))
            }
            CoreError::VersionConflict { expected, actual } => {
                ApiError::new(StatusCode::CONFLICT, "VERSION_CONFLICT", VERSION_CONFLICT_MESSAGE).with_details(json!({
                    "expected_version": expected,
                    "actual_version": actual,
                }))
            }
            CoreError::Forbidden { .. } => ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message),
            CoreError::DatabaseTimeout { .. } => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "DATABASE_TIMEOUT", message)
            }
            CoreError::PersistenceFailed(PersistenceFailure::Duplicate { constraint }) => {
                ApiError::new(StatusCode::CONFLICT, "DUPLICATE", message)
                    .with_details(json!({ "constraint": constraint }))
            }
            CoreError::PersistenceFailed(PersistenceFailure::DanglingReference { constraint }) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "DANGLING_REFERENCE", message)
                    .with_details(json!({ "constraint": constraint }))
            }
            CoreError::PersistenceFailed(PersistenceFailure::Unavailable(reason)) => {
                tracing::error!(reason = %reason, "Storage unavailable");
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", "Storage is unavailable")
            }
            CoreError::ValidationFailed { field, .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
                    .with_details(json!({ "field": field }))
            }
            CoreError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error")
            }
        }
    }
}

impl From<RetryError<CoreError>> for ApiError {
    fn from(err: RetryError<CoreError>) -> Self {
        let attempts = err.attempts();
        match err.into_last_error() {
            Some(last) => {
                let mut api = ApiError::from(last);
                if attempts > 1 {
                    let details = api.details.get_or_insert_with(|| json!({}));
                    if let Some(map) = details.as_object_mut() {
                        map.insert("attempts".into(), json!(attempts));
                    }
                }
                api
            }
            None => ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", "Request cancelled"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection {
            JsonRejection::JsonDataError(_) => ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message),
            JsonRejection::JsonSyntaxError(_) => ApiError::new(StatusCode::BAD_REQUEST, "MALFORMED_JSON", message),
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE", message)
            }
            other => ApiError::new(other.status(), "BAD_REQUEST", message),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::new(rejection.status(), "INVALID_PATH", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(rejection.status(), "INVALID_QUERY", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            details: self.details.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}
