//! Top memories by effectiveness (spec §4.7).

use crate::error::DashboardResult;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TopMemory {
    pub memory_id: String,
    pub namespace: String,
    pub agent_id: String,
    pub memory_type: String,
    pub helpful_votes: i64,
    pub harmful_votes: i64,
    pub effectiveness: f64,
}

pub struct TopMemoriesQuery;

impl TopMemoriesQuery {
    pub async fn top_by_effectiveness(pool: &PgPool, project_id: Uuid, limit: i64) -> DashboardResult<Vec<TopMemory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, namespace, agent_id, memory_type, helpful_votes, harmful_votes,
                   (helpful_votes - harmful_votes)::double precision
                       / (helpful_votes + harmful_votes + 1)::double precision AS effectiveness
            FROM memories
            WHERE project_id = $1 AND NOT is_deprecated
            ORDER BY effectiveness DESC, (helpful_votes + harmful_votes) DESC, id ASC
            LIMIT $2
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(TopMemory {
                memory_id: row.try_get("id")?,
                namespace: row.try_get("namespace")?,
                agent_id: row.try_get("agent_id")?,
                memory_type: row.try_get("memory_type")?,
                helpful_votes: row.try_get("helpful_votes")?,
                harmful_votes: row.try_get("harmful_votes")?,
                effectiveness: row.try_get("effectiveness")?,
            });
        }
        Ok(out)
    }
}
