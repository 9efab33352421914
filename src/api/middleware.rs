//! Correlation-id middleware: every request gets a stable id threaded
//! through to its response envelope and into the tracing span (§7
//! "correlation_id"), following the teacher's request-tracing convention.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone, Copy, Debug)]
pub struct CorrelationId;

pub async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(CorrelationIdExtension(correlation_id.clone()));

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let _enter = span.enter();

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

#[derive(Clone)]
pub struct CorrelationIdExtension(pub String);
