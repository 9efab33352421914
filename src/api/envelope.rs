//! `{data, meta}` / `{error, meta}` response envelope (§7 "User-visible
//! failures are shaped as {code, message, details?, correlation_id?};
//! success responses are shaped as {data, meta{timestamp, correlation_id, version}}").
//!
//! Grounded on the teacher's `api/envelope.rs` `ApiResponse`/`ApiErrorResponse`
//! pair, generalized to carry this crate's own error taxonomy instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub version: &'static str,
}

impl Meta {
    pub fn new(correlation_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            correlation_id,
            version: API_VERSION,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub meta: Meta,
}

/// One successful handler result, wrapped into `{data, meta}` with the
/// correct HTTP status code.
pub struct Envelope<T: Serialize> {
    pub status: StatusCode,
    pub data: T,
    pub correlation_id: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, correlation_id: String) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            correlation_id,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            data: self.data,
            meta: Meta::new(self.correlation_id),
        };
        (self.status, Json(body)).into_response()
    }
}

/// A handler failure, carrying the HTTP status to use and the `{code,
/// message}` pair (§7).
pub struct ApiFailure {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub correlation_id: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, correlation_id: String) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            correlation_id,
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>, correlation_id: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, correlation_id)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: ApiError {
                code: self.code,
                message: self.message,
                details: self.details,
            },
            meta: Meta::new(self.correlation_id),
        };
        (self.status, Json(body)).into_response()
    }
}
