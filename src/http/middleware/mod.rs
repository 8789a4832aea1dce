//! Cross-cutting request middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::observability::metrics;

/// Count every response by method and status.
pub async fn record_response(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_http_response(method.as_str(), response.status().as_u16());
    response
}
