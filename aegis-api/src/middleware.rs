//! Cross-cutting request middleware: a correlation id on every response
//! (spec §7: "a correlation id in a response header") and per-project rate
//! limiting (spec §4.3, §6: `429` plus `Retry-After`/`X-RateLimit-*`).

use crate::error::ApiError;
use crate::health::{RATE_LIMIT_DENIALS_TOTAL, REQUESTS_TOTAL};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::atomic::Ordering;
use tracing::Span;
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

/// Attaches a fresh correlation id to the request's tracing span and to
/// every response, success or error, so operators can grep one id across
/// logs and the client-visible response.
pub async fn correlation_id(mut request: Request<Body>, next: Next) -> Response {
    REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed);
    let correlation_id = Uuid::new_v4().to_string();
    Span::current().record("correlation_id", &correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Resolves identity from the bearer token, checks the project's rate
/// limit, and stamps `X-RateLimit-*` headers on the response regardless of
/// outcome. Runs before route handlers so a denied request never reaches a
/// repository (spec §4.9: "Rate-limit denial -> None -> RateLimited").
///
/// Health/readiness/metrics routes are mounted outside this layer (spec
/// §6 treats them as unauthenticated).
pub async fn rate_limit(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let token = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    let identity = match state.auth.verify(token).await {
        Ok(identity) => identity,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let now = Utc::now();
    let project_key = identity.project_id.to_string();
    let outcome = match state.rate_limiter.check(&project_key, now).await {
        Ok(outcome) => outcome,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(identity);

    if !outcome.allowed {
        RATE_LIMIT_DENIALS_TOTAL.fetch_add(1, Ordering::Relaxed);
        let mut response =
            ApiError::RateLimited { retry_after_seconds: outcome.retry_after_seconds }.into_response();
        insert_rate_limit_headers(&mut response, &outcome);
        return response;
    }

    let mut response = next.run(request).await;
    insert_rate_limit_headers(&mut response, &outcome);
    response
}

fn insert_rate_limit_headers(response: &mut Response, outcome: &aegis_ratelimit::CheckOutcome) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&outcome.limit_minute.to_string()) {
        headers.insert("x-ratelimit-limit-minute", v);
    }
    if let Ok(v) = HeaderValue::from_str(&outcome.limit_hour.to_string()) {
        headers.insert("x-ratelimit-limit-hour", v);
    }
    if let Ok(v) = HeaderValue::from_str(&outcome.remaining_minute.to_string()) {
        headers.insert("x-ratelimit-remaining-minute", v);
    }
    if let Ok(v) = HeaderValue::from_str(&outcome.remaining_hour.to_string()) {
        headers.insert("x-ratelimit-remaining-hour", v);
    }
    if !outcome.allowed {
        if let Ok(v) = HeaderValue::from_str(&outcome.retry_after_seconds.to_string()) {
            headers.insert(axum::http::header::RETRY_AFTER, v);
        }
    }
}
