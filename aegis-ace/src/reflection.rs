//! `ACE.reflection` (spec §4.5): shorthand for `Memory.add` with
//! `memory_type=reflection`, folding the failure-lesson fields into
//! metadata and always emitting a `reflected` event.

use crate::error::AceResult;
use aegis_database::models::{MemoryType, Scope};
use aegis_memory::{AddOutcome, MemoryRepository, NewMemory};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionInput {
    pub content: String,
    pub agent_id: String,
    #[serde(default)]
    pub error_pattern: Option<String>,
    #[serde(default)]
    pub correct_approach: Option<String>,
    #[serde(default)]
    pub source_trajectory_id: Option<String>,
    #[serde(default)]
    pub applicable_contexts: Vec<String>,
}

pub struct ReflectionRepository;

impl ReflectionRepository {
    pub async fn reflection(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_repo: &MemoryRepository,
        input: ReflectionInput,
    ) -> AceResult<AddOutcome> {
        let metadata = json!({
            "error_pattern": input.error_pattern,
            "correct_approach": input.correct_approach,
            "source_trajectory_id": input.source_trajectory_id,
            "applicable_contexts": input.applicable_contexts,
        });

        let new_memory = NewMemory {
            content: input.content,
            agent_id: input.agent_id,
            namespace: None,
            scope: Scope::Global,
            shared_with: Vec::new(),
            metadata,
            memory_type: MemoryType::Reflection,
            ttl_seconds: None,
            session_id: None,
            entity_id: None,
            sequence_number: None,
        };

        let outcome = memory_repo.add(tx, project_id, new_memory).await?;

        sqlx::query(
            r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
               VALUES ($1, $2, $3, $4, 'reflected', $5)"#,
        )
        .bind(&outcome.memory.id)
        .bind(project_id)
        .bind(&outcome.memory.namespace)
        .bind(&outcome.memory.agent_id)
        .bind(json!({}))
        .execute(&mut **tx)
        .await?;

        Ok(outcome)
    }
}
