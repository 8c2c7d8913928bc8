//! `/memories/*` (spec §6): the core memory CRUD, semantic search, and
//! export/import surface, each handler a thin adapter over
//! `aegis_memory::MemoryRepository`.

use crate::auth::AuthenticatedIdentity;
use crate::error::{ApiError, ApiResult};
use crate::health::{MEMORIES_ADDED_TOTAL, MEMORIES_DEDUPLICATED_TOTAL};
use crate::state::AppState;
use aegis_memory::{AddOutcome, BatchAddResult, ExportFilters, NewMemory, SearchHit, SemanticSearchQuery};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;

pub async fn add(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<NewMemory>,
) -> ApiResult<Json<AddOutcome>> {
    let mut tx = state.store.write_pool.begin().await?;
    let outcome = state.memory_repo.add(&mut tx, identity.project_id, req).await?;
    tx.commit().await?;
    if outcome.deduplicated {
        MEMORIES_DEDUPLICATED_TOTAL.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    } else {
        MEMORIES_ADDED_TOTAL.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<NewMemory>,
}

pub async fn add_batch(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<BatchRequest>,
) -> ApiResult<Json<BatchAddResult>> {
    let mut tx = state.store.write_pool.begin().await?;
    let result = state.memory_repo.add_batch(&mut tx, identity.project_id, req.items).await?;
    tx.commit().await?;
    MEMORIES_ADDED_TOTAL.fetch_add(result.added as u64, std::sync::atomic::Ordering::Relaxed);
    MEMORIES_DEDUPLICATED_TOTAL.fetch_add(result.deduplicated as u64, std::sync::atomic::Ordering::Relaxed);
    Ok(Json(result))
}

pub async fn query(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<SemanticSearchQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let agent_id = req.agent_id.clone();
    let hits = state
        .memory_repo
        .semantic_search(&state.store.read_pool, identity.project_id, &agent_id, req)
        .await?;
    Ok(Json(hits))
}

#[derive(Debug, Deserialize)]
pub struct CrossAgentQuery {
    #[serde(flatten)]
    pub query: SemanticSearchQuery,
    pub target_agent_ids: Vec<String>,
}

pub async fn query_cross_agent(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<CrossAgentQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let agent_id = req.query.agent_id.clone();
    let hits = state
        .memory_repo
        .query_cross_agent(
            &state.store.read_pool,
            identity.project_id,
            &agent_id,
            &req.target_agent_ids,
            req.query,
        )
        .await?;
    Ok(Json(hits))
}

pub async fn get(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(id): Path<String>,
) -> ApiResult<Json<aegis_database::models::Memory>> {
    let memory = state
        .memory_repo
        .get(&state.store.read_pool, identity.project_id, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("memory {id} not found")))?;
    Ok(Json(memory))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let mut tx = state.store.write_pool.begin().await?;
    let deleted = state.memory_repo.delete(&mut tx, identity.project_id, &id).await?;
    tx.commit().await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("memory {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub format: aegis_memory::ExportFormat,
    #[serde(default)]
    pub include_embeddings: bool,
}

/// Streams the export body rather than materializing it (spec §4.4): one
/// memory row becomes one JSON value, newline-delimited for `jsonl` or
/// comma-joined inside a top-level array for `json`.
pub async fn export(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<ExportRequest>,
) -> Response {
    let filters = ExportFilters {
        namespace: req.namespace,
        agent_id: req.agent_id,
        include_embeddings: req.include_embeddings,
    };
    let include_embeddings = filters.include_embeddings;
    let format = req.format;
    let stream = state.memory_repo.export(&state.store.read_pool, identity.project_id, filters);

    // Shared with the trailer below so a zero-row export still closes the
    // array: the trailer runs after `body_stream` is fully drained, so by
    // the time it reads `emitted_any` the flag reflects whether any row
    // was written.
    let emitted_any = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let emitted_any_for_body = emitted_any.clone();
    let body_stream = stream.map(move |item| -> Result<axum::body::Bytes, std::io::Error> {
        let memory = item.map_err(std::io::Error::other)?;
        let mut value = serde_json::to_value(&memory).map_err(std::io::Error::other)?;
        if !include_embeddings {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("embedding");
            }
        }
        let line = match format {
            aegis_memory::ExportFormat::Jsonl => format!("{value}\n"),
            aegis_memory::ExportFormat::Json => {
                let is_first = !emitted_any_for_body.swap(true, std::sync::atomic::Ordering::Relaxed);
                let prefix = if is_first { "[" } else { "," };
                format!("{prefix}{value}")
            }
        };
        Ok(axum::body::Bytes::from(line))
    });

    let content_type = match format {
        aegis_memory::ExportFormat::Jsonl => "application/x-ndjson",
        aegis_memory::ExportFormat::Json => "application/json",
    };

    let body = if matches!(format, aegis_memory::ExportFormat::Json) {
        // The closing bracket must follow the last row. If no row was ever
        // emitted, `body_stream` never wrote the opening `[`, so the
        // trailer supplies the whole empty array instead of just `]`.
        let trailer = futures::stream::once(async move {
            let closing: &'static [u8] =
                if emitted_any.load(std::sync::atomic::Ordering::Relaxed) { b"]" } else { b"[]" };
            Ok(axum::body::Bytes::from_static(closing))
        });
        Body::from_stream(body_stream.chain(trailer))
    } else {
        Body::from_stream(body_stream)
    };

    Response::builder()
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap_or_else(|_| ApiError::ServerError("failed to build export response".to_string()).into_response())
}

/// `POST /memories/import` (spec §6): newline-delimited `NewMemory`
/// records, applied as one `add_batch` inside a single transaction.
/// Bodies use `jsonl` regardless of the export format chosen on the way
/// out, since `application/json` arrays can't be parsed incrementally
/// without buffering the whole request.
pub async fn import(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    body: String,
) -> ApiResult<Json<BatchAddResult>> {
    let mut items = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let item: NewMemory = serde_json::from_str(trimmed)
            .map_err(|e| ApiError::Validation(format!("invalid import record: {e}")))?;
        items.push(item);
    }
    let mut tx = state.store.write_pool.begin().await?;
    let result = state.memory_repo.add_batch(&mut tx, identity.project_id, items).await?;
    tx.commit().await?;
    Ok(Json(result))
}
