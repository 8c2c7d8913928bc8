//! Memory-event timeline (spec §3, §4.1): append-only rows read back for
//! audit and dashboard purposes via `GET /memories/{id}/events` and
//! `GET /dashboard/memory-events`. Writes happen inline inside the
//! repositories that emit them; this module is read-only.

use crate::error::EventsResult;
use aegis_database::models::MemoryEvent;
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn row_to_event(row: &sqlx::postgres::PgRow) -> EventsResult<MemoryEvent> {
    Ok(MemoryEvent {
        event_id: row.try_get("event_id")?,
        memory_id: row.try_get("memory_id")?,
        project_id: row.try_get("project_id")?,
        namespace: row.try_get("namespace")?,
        agent_id: row.try_get("agent_id")?,
        event_type: row.try_get("event_type")?,
        event_payload: row.try_get("event_payload")?,
        created_at: row.try_get("created_at")?,
    })
}

pub struct MemoryEventRepository;

impl MemoryEventRepository {
    /// Full timeline for one memory, oldest first.
    pub async fn for_memory(pool: &PgPool, project_id: Uuid, memory_id: &str) -> EventsResult<Vec<MemoryEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM memory_events WHERE project_id = $1 AND memory_id = $2 ORDER BY created_at ASC",
        )
        .bind(project_id)
        .bind(memory_id)
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    /// Tenant-wide timeline within `[since, until)`, newest first, capped
    /// at `limit` rows.
    pub async fn for_tenant(
        pool: &PgPool,
        project_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
        until: Option<chrono::DateTime<chrono::Utc>>,
        limit: i64,
    ) -> EventsResult<Vec<MemoryEvent>> {
        let rows = sqlx::query(
            r#"SELECT * FROM memory_events
               WHERE project_id = $1
                 AND ($2::timestamptz IS NULL OR created_at >= $2)
                 AND ($3::timestamptz IS NULL OR created_at < $3)
               ORDER BY created_at DESC
               LIMIT $4"#,
        )
        .bind(project_id)
        .bind(since)
        .bind(until)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }
}
