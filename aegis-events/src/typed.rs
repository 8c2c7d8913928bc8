//! Typed memory variants (spec §4.6): stored as ordinary `Memory` rows
//! distinguished only by `memory_type`, with retrieval orderings specific
//! to how each type is consumed.

use crate::error::EventsResult;
use aegis_database::models::Memory;
use aegis_memory::{memory_from_row, SELECT_MEMORY_COLUMNS};
use sqlx::PgPool;
use uuid::Uuid;

pub struct TypedMemoryRepository;

impl TypedMemoryRepository {
    /// Episodic memories for a session, ordered by `sequence_number ASC`
    /// so the timeline reconstructs the original event order even when
    /// two rows share a `created_at` timestamp.
    pub async fn get_session_timeline(pool: &PgPool, project_id: Uuid, session_id: &str) -> EventsResult<Vec<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories
               WHERE memories.project_id = $1
                 AND memories.session_id = $2
                 AND memories.memory_type = 'episodic'
               ORDER BY memories.sequence_number ASC NULLS LAST, memories.created_at ASC"#
        );
        let rows = sqlx::query(&query).bind(project_id).bind(session_id).fetch_all(pool).await?;
        Ok(rows.iter().map(memory_from_row).collect::<Result<_, _>>()?)
    }

    /// Semantic facts for an entity, newest first.
    pub async fn get_entity_facts(pool: &PgPool, project_id: Uuid, entity_id: &str) -> EventsResult<Vec<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories
               WHERE memories.project_id = $1
                 AND memories.entity_id = $2
                 AND memories.memory_type = 'semantic'
               ORDER BY memories.created_at DESC"#
        );
        let rows = sqlx::query(&query).bind(project_id).bind(entity_id).fetch_all(pool).await?;
        Ok(rows.iter().map(memory_from_row).collect::<Result<_, _>>()?)
    }
}
