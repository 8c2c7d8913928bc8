//! `GET /health`, `GET /ready`, `GET /metrics` (spec §6). Unauthenticated,
//! mounted outside the correlation-id/rate-limit middleware stack.

use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide request counters behind the `/metrics` exporter. A
/// dependency-free substitute for a `prometheus` client: the surface here
/// is three gauges and a counter, not worth a crate.
pub static REQUESTS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static MEMORIES_ADDED_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static MEMORIES_DEDUPLICATED_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static RATE_LIMIT_DENIALS_TOTAL: AtomicU64 = AtomicU64::new(0);

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

pub async fn ready(State(state): State<AppState>) -> Response {
    if state.store.is_ready().await {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready" }))).into_response()
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.enable_metrics {
        return StatusCode::NOT_FOUND.into_response();
    }

    let body = format!(
        "# HELP aegis_requests_total Total HTTP requests served.\n\
         # TYPE aegis_requests_total counter\n\
         aegis_requests_total {requests}\n\
         # HELP aegis_memories_added_total Memories inserted (post-dedup).\n\
         # TYPE aegis_memories_added_total counter\n\
         aegis_memories_added_total {added}\n\
         # HELP aegis_memories_deduplicated_total Add/add_batch calls resolved by content-hash dedup.\n\
         # TYPE aegis_memories_deduplicated_total counter\n\
         aegis_memories_deduplicated_total {deduplicated}\n\
         # HELP aegis_rate_limit_denials_total Requests rejected by the per-project rate limiter.\n\
         # TYPE aegis_rate_limit_denials_total counter\n\
         aegis_rate_limit_denials_total {denials}\n",
        requests = REQUESTS_TOTAL.load(Ordering::Relaxed),
        added = MEMORIES_ADDED_TOTAL.load(Ordering::Relaxed),
        deduplicated = MEMORIES_DEDUPLICATED_TOTAL.load(Ordering::Relaxed),
        denials = RATE_LIMIT_DENIALS_TOTAL.load(Ordering::Relaxed),
    );

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(body.into())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
