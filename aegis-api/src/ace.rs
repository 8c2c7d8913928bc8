//! `/ace/*` (spec §6): vote tallies, delta batches, reflections, session
//! and feature state machines, playbook retrieval, runs, and curation.

use crate::auth::AuthenticatedIdentity;
use crate::error::ApiResult;
use crate::state::AppState;
use aegis_ace::{
    CreateFeatureInput, CreateSessionInput, CurationReport, DeltaOp, DeltaOutcome, DeltaRepository,
    FeatureRepository, PlaybookHit, PlaybookQuery, PlaybookRepository, ReflectionInput, ReflectionRepository,
    RunRepository, SessionPatch, SessionRepository, StartRunInput, VoteRepository,
};
use aegis_database::models::{AceRun, FeatureStatus, FeatureTracker, MemoryType, RunOutcome, SessionProgress, Vote};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: Vote,
    pub voter_agent_id: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

pub async fn vote(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(memory_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<StatusCode> {
    let mut tx = state.store.write_pool.begin().await?;
    VoteRepository::vote(
        &mut tx,
        identity.project_id,
        &memory_id,
        &req.voter_agent_id,
        req.vote,
        req.context,
        req.task_id,
    )
    .await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DeltaRequest {
    pub operations: Vec<DeltaOp>,
}

pub async fn delta(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<DeltaRequest>,
) -> ApiResult<Json<Vec<DeltaOutcome>>> {
    let mut tx = state.store.write_pool.begin().await?;
    let outcomes = DeltaRepository::apply(&mut tx, identity.project_id, &state.memory_repo, req.operations).await?;
    tx.commit().await?;
    Ok(Json(outcomes))
}

pub async fn reflection(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<ReflectionInput>,
) -> ApiResult<Json<aegis_memory::AddOutcome>> {
    let mut tx = state.store.write_pool.begin().await?;
    let outcome = ReflectionRepository::reflection(&mut tx, identity.project_id, &state.memory_repo, req).await?;
    tx.commit().await?;
    Ok(Json(outcome))
}

pub async fn create_session(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<CreateSessionInput>,
) -> ApiResult<Json<SessionProgress>> {
    let mut tx = state.store.write_pool.begin().await?;
    let session = SessionRepository::create(&mut tx, identity.project_id, req).await?;
    tx.commit().await?;
    Ok(Json(session))
}

pub async fn patch_session(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(session_id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> ApiResult<Json<SessionProgress>> {
    let mut tx = state.store.write_pool.begin().await?;
    let session = SessionRepository::update(&mut tx, identity.project_id, &session_id, patch).await?;
    tx.commit().await?;
    Ok(Json(session))
}

pub async fn get_session(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionProgress>> {
    let session = SessionRepository::get(&state.store.read_pool, identity.project_id, &session_id).await?;
    Ok(Json(session))
}

pub async fn create_feature(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<CreateFeatureInput>,
) -> ApiResult<Json<FeatureTracker>> {
    let mut tx = state.store.write_pool.begin().await?;
    let feature = FeatureRepository::create(&mut tx, identity.project_id, req).await?;
    tx.commit().await?;
    Ok(Json(feature))
}

/// Requested transition for `PATCH /ace/feature/{id}` (spec §6). Only one
/// field is set per call; `FeatureRepository` exposes one state-machine
/// primitive per transition rather than a generic setter, so this maps
/// the request onto the matching primitive.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FeaturePatchRequest {
    Start,
    BeginTesting,
    Block,
    Unblock { to: FeatureStatus },
    MarkComplete { verified_by: String },
    MarkFailed { reason: String },
    RecordTestResult { step: String, step_passed: bool },
}

pub async fn patch_feature(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(feature_id): Path<String>,
    Json(req): Json<FeaturePatchRequest>,
) -> ApiResult<Json<FeatureTracker>> {
    let mut tx = state.store.write_pool.begin().await?;
    let feature = match req {
        FeaturePatchRequest::Start => FeatureRepository::start(&mut tx, identity.project_id, &feature_id).await?,
        FeaturePatchRequest::BeginTesting => {
            FeatureRepository::begin_testing(&mut tx, identity.project_id, &feature_id).await?
        }
        FeaturePatchRequest::Block => FeatureRepository::block(&mut tx, identity.project_id, &feature_id).await?,
        FeaturePatchRequest::Unblock { to } => {
            FeatureRepository::unblock(&mut tx, identity.project_id, &feature_id, to).await?
        }
        FeaturePatchRequest::MarkComplete { verified_by } => {
            FeatureRepository::mark_complete(&mut tx, identity.project_id, &feature_id, verified_by).await?
        }
        FeaturePatchRequest::MarkFailed { reason } => {
            FeatureRepository::mark_failed(&mut tx, identity.project_id, &feature_id, reason).await?
        }
        FeaturePatchRequest::RecordTestResult { step, step_passed } => {
            FeatureRepository::record_test_result(&mut tx, identity.project_id, &feature_id, &step, step_passed)
                .await?
        }
    };
    tx.commit().await?;
    Ok(Json(feature))
}

pub async fn get_feature(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(feature_id): Path<String>,
) -> ApiResult<Json<FeatureTracker>> {
    let feature = FeatureRepository::get(&state.store.read_pool, identity.project_id, &feature_id).await?;
    Ok(Json(feature))
}

pub async fn list_features(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> ApiResult<Json<Vec<FeatureTracker>>> {
    let features = FeatureRepository::list(&state.store.read_pool, identity.project_id).await?;
    Ok(Json(features))
}

#[derive(Debug, Deserialize)]
pub struct PlaybookRequest {
    pub query: String,
    pub agent_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub include_types: Vec<MemoryType>,
    #[serde(default)]
    pub min_effectiveness: f64,
    #[serde(default = "default_playbook_top_k")]
    pub top_k: i64,
}

fn default_playbook_top_k() -> i64 {
    10
}

pub async fn playbook(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<PlaybookRequest>,
) -> ApiResult<Json<Vec<PlaybookHit>>> {
    let query = PlaybookQuery {
        query: req.query,
        agent_id: req.agent_id,
        namespace: req.namespace,
        include_types: req.include_types,
        min_effectiveness: req.min_effectiveness,
        top_k: req.top_k,
    };
    let hits =
        PlaybookRepository::playbook(&state.memory_repo, &state.store.read_pool, identity.project_id, query).await?;
    Ok(Json(hits))
}

pub async fn start_run(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Json(req): Json<StartRunInput>,
) -> ApiResult<Json<AceRun>> {
    let mut tx = state.store.write_pool.begin().await?;
    let run = RunRepository::start_run(&mut tx, identity.project_id, req).await?;
    tx.commit().await?;
    Ok(Json(run))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRunRequest {
    pub outcome: RunOutcome,
    #[serde(default)]
    pub memories_used: Vec<String>,
    #[serde(default)]
    pub error_pattern: Option<String>,
}

pub async fn complete_run(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(run_id): Path<Uuid>,
    Json(req): Json<CompleteRunRequest>,
) -> ApiResult<Json<AceRun>> {
    let mut tx = state.store.write_pool.begin().await?;
    let run = RunRepository::complete_run(
        &mut tx,
        identity.project_id,
        &state.memory_repo,
        run_id,
        req.outcome,
        req.memories_used,
        req.error_pattern,
    )
    .await?;
    tx.commit().await?;
    Ok(Json(run))
}

pub async fn get_run(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<AceRun>> {
    let run = RunRepository::get(&state.store.read_pool, identity.project_id, run_id).await?;
    Ok(Json(run))
}

pub async fn curate(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> ApiResult<Json<CurationReport>> {
    let mut tx = state.store.write_pool.begin().await?;
    let report = aegis_ace::CurationRepository::curate(&mut tx, identity.project_id).await?;
    tx.commit().await?;
    Ok(Json(report))
}
