//! Delta operations (spec §4.5): a list of atomic ops applied in order in
//! one transaction. `add` reuses `MemoryRepository::add` verbatim;
//! `update`/`deprecate` are implemented here since they mutate rows the
//! memory repository never exposes write access to beyond creation.

use crate::error::{AceError, AceResult};
use aegis_database::models::Memory;
use aegis_memory::{MemoryRepository, NewMemory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaOp {
    Add(NewMemory),
    Update {
        memory_id: String,
        metadata_patch: Value,
    },
    Deprecate {
        memory_id: String,
        #[serde(default)]
        superseded_by: Option<String>,
        #[serde(default)]
        deprecation_reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaOutcome {
    Added { memory: Memory, deduplicated: bool },
    Updated { memory: Memory },
    Deprecated { memory: Memory },
}

pub struct DeltaRepository;

impl DeltaRepository {
    /// Applies every op in order inside `tx`; the caller rolls the whole
    /// transaction back on the first `Err` (spec §4.5: "partial failure
    /// rolls back the entire batch").
    pub async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_repo: &MemoryRepository,
        ops: Vec<DeltaOp>,
    ) -> AceResult<Vec<DeltaOutcome>> {
        let mut outcomes = Vec::with_capacity(ops.len());
        for op in ops {
            let outcome = match op {
                DeltaOp::Add(new_memory) => {
                    let added = memory_repo.add(tx, project_id, new_memory).await?;
                    DeltaOutcome::Added { memory: added.memory, deduplicated: added.deduplicated }
                }
                DeltaOp::Update { memory_id, metadata_patch } => {
                    Self::update(tx, project_id, &memory_id, metadata_patch).await?
                }
                DeltaOp::Deprecate { memory_id, superseded_by, deprecation_reason } => {
                    Self::deprecate(tx, project_id, &memory_id, superseded_by, deprecation_reason).await?
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Shallow-merges `metadata_patch` into the existing metadata object.
    /// Re-applying the same patch is a no-op by construction (spec §8
    /// property 7): the merged object is identical either way.
    async fn update(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_id: &str,
        metadata_patch: Value,
    ) -> AceResult<DeltaOutcome> {
        let row = sqlx::query("SELECT metadata FROM memories WHERE id = $1 AND project_id = $2")
            .bind(memory_id)
            .bind(project_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AceError::NotFound(format!("memory {memory_id} not found")))?;

        let mut metadata: Value = row.try_get("metadata")?;
        if let (Some(existing), Some(patch)) = (metadata.as_object_mut(), metadata_patch.as_object()) {
            for (key, value) in patch {
                existing.insert(key.clone(), value.clone());
            }
        } else {
            metadata = metadata_patch;
        }

        sqlx::query("UPDATE memories SET metadata = $1, updated_at = now() WHERE id = $2 AND project_id = $3")
            .bind(&metadata)
            .bind(memory_id)
            .bind(project_id)
            .execute(&mut **tx)
            .await?;

        let memory = Self::reload(tx, project_id, memory_id).await?;
        info!(memory_id, "delta: updated metadata");
        Ok(DeltaOutcome::Updated { memory })
    }

    /// Setting `is_deprecated=true` on an already-deprecated row is a
    /// no-op: no event is re-emitted and `superseded_by`/reason are left
    /// untouched on the second call (spec §8 property 7).
    async fn deprecate(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_id: &str,
        superseded_by: Option<String>,
        deprecation_reason: Option<String>,
    ) -> AceResult<DeltaOutcome> {
        let already_deprecated: Option<(bool,)> =
            sqlx::query_as("SELECT is_deprecated FROM memories WHERE id = $1 AND project_id = $2")
                .bind(memory_id)
                .bind(project_id)
                .fetch_optional(&mut **tx)
                .await?;
        let (was_deprecated,) =
            already_deprecated.ok_or_else(|| AceError::NotFound(format!("memory {memory_id} not found")))?;

        if !was_deprecated {
            sqlx::query(
                r#"UPDATE memories SET is_deprecated = true, superseded_by = $1,
                   deprecation_reason = $2, updated_at = now() WHERE id = $3 AND project_id = $4"#,
            )
            .bind(&superseded_by)
            .bind(&deprecation_reason)
            .bind(memory_id)
            .bind(project_id)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
                   SELECT $1, $2, namespace, agent_id, 'deprecated', $3 FROM memories WHERE id = $1 AND project_id = $2"#,
            )
            .bind(memory_id)
            .bind(project_id)
            .bind(serde_json::json!({ "superseded_by": superseded_by, "reason": deprecation_reason }))
            .execute(&mut **tx)
            .await?;
            info!(memory_id, "delta: deprecated");
        }

        let memory = Self::reload(tx, project_id, memory_id).await?;
        Ok(DeltaOutcome::Deprecated { memory })
    }

    async fn reload(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, memory_id: &str) -> AceResult<Memory> {
        let query = format!(
            "SELECT {} FROM memories WHERE memories.id = $1 AND memories.project_id = $2",
            aegis_memory::SELECT_MEMORY_COLUMNS
        );
        let row = sqlx::query(&query).bind(memory_id).bind(project_id).fetch_one(&mut **tx).await?;
        aegis_memory::memory_from_row(&row).map_err(AceError::from)
    }
}
