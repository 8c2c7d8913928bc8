//! Unifies every repository error kind into the HTTP contract spec §7
//! documents: `{error, message, details?}`, a correlation id header, and
//! `Retry-After` on rate-limit denials. Nothing here swallows an error;
//! conversions are one-to-one with the upstream error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    RateLimited { retry_after_seconds: u64 },
    ExternalServiceUnavailable(String),
    ServerError(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::ExternalServiceUnavailable(_) => "external_service_unavailable",
            ApiError::ServerError(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ExternalServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::ExternalServiceUnavailable(m)
            | ApiError::ServerError(m) => m.clone(),
            ApiError::RateLimited { retry_after_seconds } => {
                format!("rate limit exceeded, retry after {retry_after_seconds}s")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::ServerError(_)) {
            tracing::error!(error = %self.message(), "request failed with server error");
        }
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        };
        let body = ErrorBody { error: self.kind(), message: self.message(), details: None };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<aegis_memory::MemoryError> for ApiError {
    fn from(err: aegis_memory::MemoryError) -> Self {
        match err {
            aegis_memory::MemoryError::Validation(m) => ApiError::Validation(m),
            aegis_memory::MemoryError::NotFound(m) => ApiError::NotFound(m),
            aegis_memory::MemoryError::ExternalServiceUnavailable(m) => {
                ApiError::ExternalServiceUnavailable(m)
            }
            aegis_memory::MemoryError::Database(e) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<aegis_ace::AceError> for ApiError {
    fn from(err: aegis_ace::AceError) -> Self {
        match err {
            aegis_ace::AceError::Validation(m) => ApiError::Validation(m),
            aegis_ace::AceError::NotFound(m) => ApiError::NotFound(m),
            aegis_ace::AceError::InvalidTransition(m) => ApiError::Conflict(m),
            aegis_ace::AceError::Conflict(m) => ApiError::Conflict(m),
            aegis_ace::AceError::ExternalServiceUnavailable(m) => {
                ApiError::ExternalServiceUnavailable(m)
            }
            aegis_ace::AceError::Database(e) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<aegis_events::EventsError> for ApiError {
    fn from(err: aegis_events::EventsError) -> Self {
        match err {
            aegis_events::EventsError::Validation(m) => ApiError::Validation(m),
            aegis_events::EventsError::NotFound(m) => ApiError::NotFound(m),
            aegis_events::EventsError::ExternalServiceUnavailable(m) => {
                ApiError::ExternalServiceUnavailable(m)
            }
            aegis_events::EventsError::Database(e) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<aegis_dashboard::DashboardError> for ApiError {
    fn from(err: aegis_dashboard::DashboardError) -> Self {
        match err {
            aegis_dashboard::DashboardError::Validation(m) => ApiError::Validation(m),
            aegis_dashboard::DashboardError::Database(e) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<aegis_auth::AuthError> for ApiError {
    fn from(err: aegis_auth::AuthError) -> Self {
        match err {
            aegis_auth::AuthError::Unauthorized(m) => ApiError::Unauthorized(m),
            aegis_auth::AuthError::Forbidden(m) => ApiError::Forbidden(m),
            aegis_auth::AuthError::Database(e) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<aegis_ratelimit::RateLimitError> for ApiError {
    fn from(err: aegis_ratelimit::RateLimitError) -> Self {
        match err {
            aegis_ratelimit::RateLimitError::LimitExceeded { retry_after_seconds } => {
                ApiError::RateLimited { retry_after_seconds }
            }
            aegis_ratelimit::RateLimitError::Backend(m) => ApiError::ServerError(m),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::ServerError(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
