//! Typed memory variants, the memory-event timeline, and interaction-event
//! causal chains (spec §6 `/memories/typed/*`, `/memories/:id/events`,
//! `/interaction-events/*`).

use crate::auth::AuthenticatedIdentity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use aegis_database::models::{InteractionEvent, Memory, MemoryEvent, MemoryType};
use aegis_events::{MemoryEventRepository, NewInteractionEvent, TypedMemoryRepository};
use aegis_memory::{NewMemory, SearchFilters, SearchHit, SemanticSearchQuery};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

fn parse_typed_kind(kind: &str) -> ApiResult<MemoryType> {
    match kind {
        "episodic" => Ok(MemoryType::Episodic),
        "semantic" => Ok(MemoryType::Semantic),
        "procedural" => Ok(MemoryType::Procedural),
        "control" => Ok(MemoryType::Control),
        other => Err(ApiError::Validation(format!(
            "unknown typed memory kind {other:?}, expected one of episodic, semantic, procedural, control"
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTypedMemoryRequest {
    pub content: String,
    pub agent_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

/// `POST /memories/typed/{kind}` (spec §6): creates an ordinary memory
/// row tagged with the requested typed `memory_type`, otherwise going
/// through `Memory.add` exactly as `/memories/` does.
pub async fn create_typed(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(kind): Path<String>,
    Json(req): Json<CreateTypedMemoryRequest>,
) -> ApiResult<Json<aegis_memory::AddOutcome>> {
    let memory_type = parse_typed_kind(&kind)?;
    let new_memory = NewMemory {
        content: req.content,
        agent_id: req.agent_id,
        namespace: req.namespace,
        scope: aegis_database::models::Scope::AgentPrivate,
        shared_with: Vec::new(),
        metadata: req.metadata,
        memory_type,
        ttl_seconds: req.ttl_seconds,
        session_id: req.session_id,
        entity_id: req.entity_id,
        sequence_number: req.sequence_number,
    };
    let mut tx = state.store.write_pool.begin().await?;
    let outcome = state.memory_repo.add(&mut tx, identity.project_id, new_memory).await?;
    tx.commit().await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct TypedQueryRequest {
    pub query: String,
    pub agent_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub memory_types: Vec<MemoryType>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default)]
    pub min_score: Option<f64>,
}

fn default_top_k() -> i64 {
    10
}

/// `POST /memories/typed/query` (spec §6): `semantic_search` restricted
/// to one or more typed `memory_type`s.
pub async fn typed_query(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<TypedQueryRequest>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let agent_id = req.agent_id.clone();
    let query = SemanticSearchQuery {
        query: req.query,
        agent_id: req.agent_id,
        namespace: req.namespace,
        filters: SearchFilters { metadata: None, memory_types: req.memory_types },
        top_k: req.top_k,
        min_score: req.min_score,
        include_deprecated: false,
    };
    let hits = state
        .memory_repo
        .semantic_search(&state.store.read_pool, identity.project_id, &agent_id, query)
        .await?;
    Ok(Json(hits))
}

pub async fn episodic_session_timeline(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<Memory>>> {
    let memories =
        TypedMemoryRepository::get_session_timeline(&state.store.read_pool, identity.project_id, &session_id).await?;
    Ok(Json(memories))
}

pub async fn semantic_entity_facts(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<Vec<Memory>>> {
    let memories =
        TypedMemoryRepository::get_entity_facts(&state.store.read_pool, identity.project_id, &entity_id).await?;
    Ok(Json(memories))
}

/// `GET /memories/{id}/events` (spec §3, §4.1): the full audit timeline for
/// one memory, oldest first.
pub async fn memory_event_timeline(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(memory_id): Path<String>,
) -> ApiResult<Json<Vec<MemoryEvent>>> {
    let events = MemoryEventRepository::for_memory(&state.store.read_pool, identity.project_id, &memory_id).await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct TenantEventsQuery {
    #[serde(default)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default = "default_tenant_events_limit")]
    pub limit: i64,
}

fn default_tenant_events_limit() -> i64 {
    100
}

/// `GET /dashboard/memory-events` (spec §3, §4.1): tenant-wide memory-event
/// timeline underpinning the dashboard, newest first.
pub async fn tenant_memory_events(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Query(query): Query<TenantEventsQuery>,
) -> ApiResult<Json<Vec<MemoryEvent>>> {
    let events = MemoryEventRepository::for_tenant(
        &state.store.read_pool,
        identity.project_id,
        query.since,
        query.until,
        query.limit,
    )
    .await?;
    Ok(Json(events))
}

pub async fn create_interaction_event(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<NewInteractionEvent>,
) -> ApiResult<Json<InteractionEvent>> {
    let event = state
        .interaction_repo
        .insert(&state.store.write_pool, identity.project_id, req)
        .await?;
    Ok(Json(event))
}

pub async fn list_by_session(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<InteractionEvent>>> {
    let events =
        aegis_events::InteractionEventRepository::list_by_session(&state.store.read_pool, identity.project_id, &session_id)
            .await?;
    Ok(Json(events))
}

pub async fn list_by_agent(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<InteractionEvent>>> {
    let events =
        aegis_events::InteractionEventRepository::list_by_agent(&state.store.read_pool, identity.project_id, &agent_id)
            .await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct InteractionSearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

#[derive(Debug, serde::Serialize)]
pub struct InteractionSearchHit {
    pub event: InteractionEvent,
    pub distance: f64,
}

pub async fn search_interactions(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<InteractionSearchRequest>,
) -> ApiResult<Json<Vec<InteractionSearchHit>>> {
    let hits = state
        .interaction_repo
        .search(&state.store.read_pool, identity.project_id, &req.query, req.top_k)
        .await?;
    Ok(Json(hits.into_iter().map(|(event, distance)| InteractionSearchHit { event, distance }).collect()))
}

#[derive(Debug, serde::Serialize)]
pub struct InteractionEventWithChain {
    pub event: InteractionEvent,
    pub chain: Vec<InteractionEvent>,
}

/// `GET /interaction-events/{id}` (spec §6): the event plus its causal
/// chain root-first, per spec §8 property 10.
pub async fn get_interaction_event(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<InteractionEventWithChain>> {
    let chain = aegis_events::InteractionEventRepository::chain(&state.store.read_pool, identity.project_id, event_id).await?;
    let event = chain
        .last()
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("interaction event {event_id} not found")))?;
    Ok(Json(InteractionEventWithChain { event, chain }))
}
