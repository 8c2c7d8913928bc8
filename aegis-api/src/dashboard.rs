//! Read-only aggregation endpoints backing the dashboard/eval surface
//! (spec §4.7). Not individually enumerated in spec §6's endpoint list,
//! but component #10 routes every component through an HTTP adapter, and
//! `aegis-dashboard` has no other caller.

use crate::auth::AuthenticatedIdentity;
use crate::error::ApiResult;
use crate::state::AppState;
use aegis_dashboard::{BucketWidth, CorrelationQuery, CorrelationReport, EventCountBucket, EventCountsQuery, TopMemoriesQuery, TopMemory};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EventCountsParams {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    #[serde(default)]
    pub bucket: BucketWidthParam,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidthParam {
    Hour,
    #[default]
    Day,
}

pub async fn event_counts(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Query(params): Query<EventCountsParams>,
) -> ApiResult<Json<Vec<EventCountBucket>>> {
    let bucket = match params.bucket {
        BucketWidthParam::Hour => BucketWidth::Hour,
        BucketWidthParam::Day => BucketWidth::Day,
    };
    let buckets = EventCountsQuery::counts_by_type(
        &state.store.read_pool,
        identity.project_id,
        params.since,
        params.until,
        bucket,
    )
    .await?;
    Ok(Json(buckets))
}

#[derive(Debug, Deserialize)]
pub struct TopMemoriesParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

pub async fn top_memories(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    Query(params): Query<TopMemoriesParams>,
) -> ApiResult<Json<Vec<TopMemory>>> {
    let top = TopMemoriesQuery::top_by_effectiveness(&state.store.read_pool, identity.project_id, params.limit).await?;
    Ok(Json(top))
}

pub async fn correlation(
    State(state): State<AppState>,
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
) -> ApiResult<Json<CorrelationReport>> {
    let report = CorrelationQuery::effectiveness_vs_run_success(&state.store.read_pool, identity.project_id).await?;
    Ok(Json(report))
}
