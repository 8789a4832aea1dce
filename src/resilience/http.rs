//! Outbound HTTP calls with retry.
//!
//! Non-2xx responses become [`HttpError::Status`]; transport failures become
//! [`HttpError::Network`] or [`HttpError::Timeout`]. Connection problems,
//! timeouts, 5xx, 408 and 429 are retried, every other status is terminal.

use reqwest::{Client, Request, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::RetryPolicy;
use crate::resilience::retries::{RetryError, Retrier, Retryable};

/// Failure of a single outbound HTTP attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// Connection refused, reset, DNS failure and the like.
    #[error("Network error: {0}")]
    Network(String),

    /// The client-side deadline elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("Upstream responded with status {status}")]
    Status { status: u16 },

    /// The request body is a stream and cannot be sent twice.
    #[error("Request body cannot be replayed")]
    NotReplayable,

    /// A success response carried a body that did not decode.
    #[error("Failed to decode response body: {0}")]
    Decode(String),
}

impl HttpError {
    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else if err.is_decode() {
            HttpError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            HttpError::Status {
                status: status.as_u16(),
            }
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network(_) | HttpError::Timeout => true,
            HttpError::Status { status } => is_retryable_status(*status),
            HttpError::NotReplayable | HttpError::Decode(_) => false,
        }
    }
}

/// 5xx, 408 Request Timeout and 429 Too Many Requests.
pub fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status) || status == 408 || status == 429
}

/// Send `request`, retrying transient failures under `policy`.
///
/// The request is cloned for every attempt. On exhaustion the last status or
/// network error is preserved in [`RetryError::Exhausted`].
pub async fn fetch_with_retry(
    client: &Client,
    request: Request,
    policy: &RetryPolicy,
) -> Result<Response, RetryError<HttpError>> {
    fetch(client, request, policy, None).await
}

/// Like [`fetch_with_retry`], giving up with [`RetryError::Cancelled`] once
/// `cancel` fires, whether mid-request or mid-backoff.
pub async fn fetch_with_cancellation(
    client: &Client,
    request: Request,
    policy: &RetryPolicy,
    cancel: CancellationToken,
) -> Result<Response, RetryError<HttpError>> {
    fetch(client, request, policy, Some(cancel)).await
}

async fn fetch(
    client: &Client,
    request: Request,
    policy: &RetryPolicy,
    cancel: Option<CancellationToken>,
) -> Result<Response, RetryError<HttpError>> {
    let method = request.method().clone();
    let url = request.url().clone();

    let mut retrier = Retrier::new(policy).named("http").on_retry(|attempt, err: &HttpError| {
        tracing::info!(method = %method, url = %url, attempt, error = %err, "Retrying outbound request");
    });
    if let Some(token) = cancel {
        retrier = retrier.with_cancellation(token);
    }
    retrier
        .run_transient(|| {
            let attempt = request.try_clone();
            async move {
                let attempt = attempt.ok_or(HttpError::NotReplayable)?;
                let response = client.execute(attempt).await?;
                check_status(response)
            }
        })
        .await
}

/// Like [`fetch_with_retry`], decoding a successful JSON body.
///
/// A body that fails to decode is terminal; it is not retried.
pub async fn fetch_json_with_retry<T: DeserializeOwned>(
    client: &Client,
    request: Request,
    policy: &RetryPolicy,
) -> Result<T, RetryError<HttpError>> {
    Retrier::new(policy)
        .named("http_json")
        .run_transient(|| {
            let attempt = request.try_clone();
            async move {
                let attempt = attempt.ok_or(HttpError::NotReplayable)?;
                let response = check_status(client.execute(attempt).await?)?;
                response
                    .json::<T>()
                    .await
                    .map_err(|e| HttpError::Decode(e.to_string()))
            }
        })
        .await
}

fn check_status(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpError::Status {
            status: status.as_u16(),
        })
    }
}
