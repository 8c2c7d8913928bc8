//! Memory repository (spec §4.4): CRUD, dedup, TTL, ACL-filtered semantic
//! search, cross-agent queries, batch insert, export.
//!
//! Grounded on the teacher's `agent-memory/src/memory_manager.rs`
//! `MemoryManager` (raw `sqlx::query` + manual `row.try_get` mapping,
//! `info!`/`debug!` around every mutation) generalized from a single
//! `agent_experiences` table to the full `memories` schema plus the
//! normalized ACL relation and append-only event timeline spec §3/§4.1
//! require. Transaction discipline follows spec §4.1: every write method
//! takes the caller's open transaction rather than opening its own.

use crate::error::{MemoryError, MemoryResult};
use crate::types::{AddOutcome, BatchAddResult, ExportFilters, NewMemory, SearchHit, SemanticSearchQuery};
use aegis_database::models::{Memory, Scope};
use aegis_embedding::{normalize_and_hash, EmbeddingService};
use chrono::{Duration, Utc};
use futures::stream::{Stream, StreamExt};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct MemoryRepository {
    embedding: Arc<EmbeddingService>,
}

fn new_memory_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Postgres SQLSTATE `23505` (unique_violation) — the signal the losing
/// side of a concurrent dedup race observes (spec §5, §8 property 1).
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().and_then(|e| e.code()).as_deref() == Some("23505")
}

/// Shared row-mapping used by every crate that reads `memories` directly
/// with a custom `SELECT` (e.g. `aegis-ace`'s delta/playbook queries),
/// kept in one place so the column layout only has to be understood once.
pub fn memory_from_row(row: &PgRow) -> MemoryResult<Memory> {
    let scope: String = row.try_get("scope")?;
    let memory_type: String = row.try_get("memory_type")?;
    let embedding: pgvector::Vector = row.try_get("embedding")?;
    let shared_with: Vec<String> = row.try_get("shared_with").unwrap_or_default();

    Ok(Memory {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        namespace: row.try_get("namespace")?,
        agent_id: row.try_get("agent_id")?,
        content: row.try_get("content")?,
        content_hash: row.try_get("content_hash")?,
        embedding: embedding.to_vec(),
        scope: Scope::from_str(&scope).map_err(|e| MemoryError::Validation(e.to_string()))?,
        shared_with,
        memory_type: aegis_database::models::MemoryType::from_str(&memory_type)
            .map_err(|e| MemoryError::Validation(e.to_string()))?,
        is_deprecated: row.try_get("is_deprecated")?,
        superseded_by: row.try_get("superseded_by")?,
        deprecation_reason: row.try_get("deprecation_reason")?,
        helpful_votes: row.try_get("helpful_votes")?,
        harmful_votes: row.try_get("harmful_votes")?,
        ttl_seconds: row.try_get("ttl_seconds")?,
        expires_at: row.try_get("expires_at")?,
        session_id: row.try_get("session_id")?,
        entity_id: row.try_get("entity_id")?,
        sequence_number: row.try_get("sequence_number")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Columns selected by every read query; `shared_with` is assembled via a
/// lateral aggregate over the normalized ACL relation so it always reads
/// current, never a denormalized copy (spec §9: "the JSON field is not
/// part of the contract").
pub const SELECT_MEMORY_COLUMNS: &str = r#"
    memories.id, memories.project_id, memories.namespace, memories.agent_id,
    memories.content, memories.content_hash, memories.embedding, memories.scope,
    memories.memory_type, memories.is_deprecated, memories.superseded_by,
    memories.deprecation_reason, memories.helpful_votes, memories.harmful_votes,
    memories.ttl_seconds, memories.expires_at, memories.session_id, memories.entity_id,
    memories.sequence_number, memories.metadata, memories.created_at, memories.updated_at,
    COALESCE(
        (SELECT array_agg(shared_agent_id) FROM memory_shared_agents
         WHERE memory_shared_agents.memory_id = memories.id),
        ARRAY[]::text[]
    ) AS shared_with
"#;

impl MemoryRepository {
    pub fn new(embedding: Arc<EmbeddingService>) -> Self {
        Self { embedding }
    }

    fn validate_scope(req: &NewMemory) -> MemoryResult<()> {
        if req.scope != Scope::AgentShared && !req.shared_with.is_empty() {
            return Err(MemoryError::Validation(
                "shared_with is only valid with scope=agent-shared".to_string(),
            ));
        }
        if req.content.trim().is_empty() {
            return Err(MemoryError::Validation("content cannot be empty".to_string()));
        }
        Ok(())
    }

    /// `Memory.add` (spec §4.4): compute the content hash, return the
    /// existing live row on collision, otherwise embed + insert + write
    /// ACL rows + emit a `created` event, all inside `tx`.
    pub async fn add(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        req: NewMemory,
    ) -> MemoryResult<AddOutcome> {
        Self::validate_scope(&req)?;
        let namespace = req.namespace.clone().unwrap_or_else(|| "default".to_string());
        let content_hash = normalize_and_hash(&req.content);

        if let Some(existing) = self
            .find_live_by_hash(tx, project_id, &namespace, &req.agent_id, &content_hash)
            .await?
        {
            debug!(id = %existing.id, "add: deduplicated against existing live memory");
            return Ok(AddOutcome { memory: existing, deduplicated: true });
        }

        let embedding = self.embedding.embed(&mut **tx, &req.content).await?;

        // A concurrent `add` of the same content can win the race between
        // the check above and this insert (spec §5). Insert under a
        // savepoint so a unique-violation on `idx_memories_content_hash_live`
        // rolls back only the insert, not the caller's whole transaction,
        // then re-reads the winning row.
        let mut savepoint = tx.begin().await?;
        match self
            .insert_memory(&mut savepoint, project_id, &namespace, &req, &content_hash, embedding)
            .await
        {
            Ok(memory) => {
                savepoint.commit().await?;
                self.emit_event(tx, &memory, "created", serde_json::json!({})).await?;
                info!(id = %memory.id, agent_id = %memory.agent_id, "created memory");
                Ok(AddOutcome { memory, deduplicated: false })
            }
            Err(MemoryError::Database(e)) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                let existing = self
                    .find_live_by_hash(tx, project_id, &namespace, &req.agent_id, &content_hash)
                    .await?
                    .ok_or(MemoryError::Database(e))?;
                debug!(id = %existing.id, "add: lost dedup race, returning winning row");
                Ok(AddOutcome { memory: existing, deduplicated: true })
            }
            Err(e) => Err(e),
        }
    }

    /// `Memory.add_batch` (spec §4.4): one embedding batch call for every
    /// miss, dedup per item, everything written in the caller's `tx`.
    pub async fn add_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        items: Vec<NewMemory>,
    ) -> MemoryResult<BatchAddResult> {
        for item in &items {
            Self::validate_scope(item)?;
        }

        let namespaces: Vec<String> = items
            .iter()
            .map(|i| i.namespace.clone().unwrap_or_else(|| "default".to_string()))
            .collect();
        let hashes: Vec<String> = items.iter().map(|i| normalize_and_hash(&i.content)).collect();

        let mut existing = Vec::with_capacity(items.len());
        for ((item, namespace), hash) in items.iter().zip(&namespaces).zip(&hashes) {
            existing.push(
                self.find_live_by_hash(tx, project_id, namespace, &item.agent_id, hash)
                    .await?,
            );
        }

        let miss_indices: Vec<usize> = existing
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_none())
            .map(|(i, _)| i)
            .collect();
        let miss_texts: Vec<String> = miss_indices.iter().map(|&i| items[i].content.clone()).collect();
        let embeddings = if miss_texts.is_empty() {
            Vec::new()
        } else {
            self.embedding.embed_batch(tx, &miss_texts).await?
        };

        let mut memories = Vec::with_capacity(items.len());
        let mut added = 0;
        let mut deduplicated = 0;
        let mut embedding_cursor = 0;

        for (i, item) in items.into_iter().enumerate() {
            if let Some(existing_memory) = existing[i].take() {
                deduplicated += 1;
                memories.push(existing_memory);
                continue;
            }
            let embedding = embeddings[embedding_cursor].clone();
            embedding_cursor += 1;

            let mut savepoint = tx.begin().await?;
            let insert_result = self
                .insert_memory(&mut savepoint, project_id, &namespaces[i], &item, &hashes[i], embedding)
                .await;
            let memory = match insert_result {
                Ok(memory) => {
                    savepoint.commit().await?;
                    self.emit_event(tx, &memory, "created", serde_json::json!({})).await?;
                    added += 1;
                    memory
                }
                Err(MemoryError::Database(e)) if is_unique_violation(&e) => {
                    savepoint.rollback().await?;
                    let winner = self
                        .find_live_by_hash(tx, project_id, &namespaces[i], &item.agent_id, &hashes[i])
                        .await?
                        .ok_or(MemoryError::Database(e))?;
                    deduplicated += 1;
                    winner
                }
                Err(e) => return Err(e),
            };
            memories.push(memory);
        }

        info!(added, deduplicated, "add_batch complete");
        Ok(BatchAddResult { memories, added, deduplicated })
    }

    async fn find_live_by_hash(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        namespace: &str,
        agent_id: &str,
        content_hash: &str,
    ) -> MemoryResult<Option<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories
               WHERE project_id = $1 AND namespace = $2 AND agent_id = $3
                 AND content_hash = $4 AND NOT is_deprecated
               LIMIT 1"#
        );
        let row = sqlx::query(&query)
            .bind(project_id)
            .bind(namespace)
            .bind(agent_id)
            .bind(content_hash)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(memory_from_row).transpose()
    }

    async fn insert_memory(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        namespace: &str,
        req: &NewMemory,
        content_hash: &str,
        embedding: Vec<f32>,
    ) -> MemoryResult<Memory> {
        let id = new_memory_id();
        let now = Utc::now();
        let expires_at = req.ttl_seconds.map(|ttl| now + Duration::seconds(ttl));

        // `RETURNING` can't see the ACL rows inserted just below, so the
        // returned `Memory` is assembled from the input rather than re-queried.
        sqlx::query(
            r#"
            INSERT INTO memories (
                id, project_id, namespace, agent_id, content, content_hash, embedding,
                scope, memory_type, helpful_votes, harmful_votes, ttl_seconds, expires_at,
                session_id, entity_id, sequence_number, metadata, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, $10, $11, $12, $13, $14, $15, $16, $16
            )
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(namespace)
        .bind(&req.agent_id)
        .bind(&req.content)
        .bind(content_hash)
        .bind(pgvector::Vector::from(embedding.clone()))
        .bind(req.scope.to_string())
        .bind(req.memory_type.to_string())
        .bind(req.ttl_seconds)
        .bind(expires_at)
        .bind(&req.session_id)
        .bind(&req.entity_id)
        .bind(req.sequence_number)
        .bind(&req.metadata)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        if req.scope == Scope::AgentShared {
            for shared_agent_id in &req.shared_with {
                sqlx::query(
                    r#"INSERT INTO memory_shared_agents (memory_id, project_id, namespace, shared_agent_id)
                       VALUES ($1, $2, $3, $4)
                       ON CONFLICT DO NOTHING"#,
                )
                .bind(&id)
                .bind(project_id)
                .bind(namespace)
                .bind(shared_agent_id)
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(Memory {
            id,
            project_id,
            namespace: namespace.to_string(),
            agent_id: req.agent_id.clone(),
            content: req.content.clone(),
            content_hash: content_hash.to_string(),
            embedding,
            scope: req.scope,
            shared_with: req.shared_with.clone(),
            memory_type: req.memory_type,
            is_deprecated: false,
            superseded_by: None,
            deprecation_reason: None,
            helpful_votes: 0,
            harmful_votes: 0,
            ttl_seconds: req.ttl_seconds,
            expires_at,
            session_id: req.session_id.clone(),
            entity_id: req.entity_id.clone(),
            sequence_number: req.sequence_number,
            metadata: req.metadata.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn emit_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        memory: &Memory,
        event_type: &str,
        payload: serde_json::Value,
    ) -> MemoryResult<()> {
        sqlx::query(
            r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&memory.id)
        .bind(memory.project_id)
        .bind(&memory.namespace)
        .bind(&memory.agent_id)
        .bind(event_type)
        .bind(payload)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn get(&self, pool: &PgPool, project_id: Uuid, id: &str) -> MemoryResult<Option<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories WHERE project_id = $1 AND id = $2"#
        );
        let row = sqlx::query(&query).bind(project_id).bind(id).fetch_optional(pool).await?;
        row.as_ref().map(memory_from_row).transpose()
    }

    /// Hard delete; cascades to ACL rows, vote history, and memory events
    /// via the `ON DELETE CASCADE` foreign keys declared in the schema.
    pub async fn delete(&self, tx: &mut Transaction<'_, Postgres>, project_id: Uuid, id: &str) -> MemoryResult<bool> {
        let result = sqlx::query("DELETE FROM memories WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Shared by `semantic_search`/`query_cross_agent` here and by
    /// `aegis-ace`'s playbook retrieval, so ACL logic never drifts between
    /// the two nearly-identical queries.
    pub fn acl_predicate(param_index: usize) -> String {
        format!(
            r#"(
                memories.scope = 'global'
                OR (memories.scope = 'agent-private' AND memories.agent_id = ${param_index})
                OR (memories.scope = 'agent-shared' AND (
                    memories.agent_id = ${param_index}
                    OR EXISTS (
                        SELECT 1 FROM memory_shared_agents
                        WHERE memory_shared_agents.memory_id = memories.id
                          AND memory_shared_agents.shared_agent_id = ${param_index}
                    )
                ))
            )"#
        )
    }

    /// `Memory.semantic_search` (spec §4.4): ACL-filtered ANN scan ordered
    /// by cosine distance, ties broken by `created_at DESC` then `id`.
    pub async fn semantic_search(
        &self,
        pool: &PgPool,
        project_id: Uuid,
        requesting_agent_id: &str,
        query: SemanticSearchQuery,
    ) -> MemoryResult<Vec<SearchHit>> {
        let namespace = query.namespace.unwrap_or_else(|| "default".to_string());
        let query_embedding = self.embedding.embed(pool, &query.query).await?;
        let max_distance = query.min_score.map(|s| 1.0 - s);
        let memory_types: Option<Vec<String>> = if query.filters.memory_types.is_empty() {
            None
        } else {
            Some(query.filters.memory_types.iter().map(|t| t.to_string()).collect())
        };

        let sql = format!(
            r#"
            SELECT {SELECT_MEMORY_COLUMNS}, (memories.embedding <=> $1) AS distance
            FROM memories
            WHERE memories.project_id = $2
              AND memories.namespace = $3
              AND (memories.expires_at IS NULL OR memories.expires_at > now())
              AND ($4 OR NOT memories.is_deprecated)
              AND ($5::jsonb IS NULL OR memories.metadata @> $5)
              AND ($6::double precision IS NULL OR (memories.embedding <=> $1) <= $6)
              AND ($8::text[] IS NULL OR memories.memory_type = ANY($8))
              AND {acl}
            ORDER BY distance ASC, memories.created_at DESC, memories.id ASC
            LIMIT $7
            "#,
            acl = Self::acl_predicate(9),
        );

        let rows = sqlx::query(&sql)
            .bind(pgvector::Vector::from(query_embedding))
            .bind(project_id)
            .bind(&namespace)
            .bind(query.include_deprecated)
            .bind(query.filters.metadata.clone())
            .bind(max_distance)
            .bind(query.top_k)
            .bind(memory_types)
            .bind(requesting_agent_id)
            .fetch_all(pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory = memory_from_row(row)?;
            let distance: f64 = row.try_get("distance")?;
            hits.push(SearchHit { memory, distance });
        }

        self.emit_queried_events(pool, project_id, &hits).await?;
        Ok(hits)
    }

    /// `Memory.query_cross_agent` (spec §4.4): as `semantic_search` but
    /// restricted to memories authored by one of `target_agent_ids`, still
    /// subject to the same ACL predicate for the requesting agent.
    pub async fn query_cross_agent(
        &self,
        pool: &PgPool,
        project_id: Uuid,
        requesting_agent_id: &str,
        target_agent_ids: &[String],
        query: SemanticSearchQuery,
    ) -> MemoryResult<Vec<SearchHit>> {
        if target_agent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let namespace = query.namespace.unwrap_or_else(|| "default".to_string());
        let query_embedding = self.embedding.embed(pool, &query.query).await?;
        let max_distance = query.min_score.map(|s| 1.0 - s);
        let memory_types: Option<Vec<String>> = if query.filters.memory_types.is_empty() {
            None
        } else {
            Some(query.filters.memory_types.iter().map(|t| t.to_string()).collect())
        };

        let sql = format!(
            r#"
            SELECT {SELECT_MEMORY_COLUMNS}, (memories.embedding <=> $1) AS distance
            FROM memories
            WHERE memories.project_id = $2
              AND memories.namespace = $3
              AND memories.agent_id = ANY($4)
              AND (memories.expires_at IS NULL OR memories.expires_at > now())
              AND ($5 OR NOT memories.is_deprecated)
              AND ($6::double precision IS NULL OR (memories.embedding <=> $1) <= $6)
              AND ($8::text[] IS NULL OR memories.memory_type = ANY($8))
              AND {acl}
            ORDER BY distance ASC, memories.created_at DESC, memories.id ASC
            LIMIT $7
            "#,
            acl = Self::acl_predicate(9),
        );

        let rows = sqlx::query(&sql)
            .bind(pgvector::Vector::from(query_embedding))
            .bind(project_id)
            .bind(&namespace)
            .bind(target_agent_ids)
            .bind(query.include_deprecated)
            .bind(max_distance)
            .bind(query.top_k)
            .bind(memory_types)
            .bind(requesting_agent_id)
            .fetch_all(pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory = memory_from_row(row)?;
            let distance: f64 = row.try_get("distance")?;
            hits.push(SearchHit { memory, distance });
        }

        self.emit_queried_events(pool, project_id, &hits).await?;
        Ok(hits)
    }

    /// Emits a `queried` event per returned row. Decoupled from the ANN
    /// scan itself (a separate statement, not part of its query plan) but
    /// still awaited before the caller's request completes, so tests can
    /// observe it deterministically (spec §4.4).
    async fn emit_queried_events(&self, pool: &PgPool, project_id: Uuid, hits: &[SearchHit]) -> MemoryResult<()> {
        for hit in hits {
            sqlx::query(
                r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
                   VALUES ($1, $2, $3, NULL, 'queried', $4)"#,
            )
            .bind(&hit.memory.id)
            .bind(project_id)
            .bind(&hit.memory.namespace)
            .bind(serde_json::json!({ "distance": hit.distance }))
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    pub async fn list_by_session(&self, pool: &PgPool, project_id: Uuid, session_id: &str) -> MemoryResult<Vec<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories
               WHERE project_id = $1 AND session_id = $2
               ORDER BY created_at ASC"#
        );
        let rows = sqlx::query(&query).bind(project_id).bind(session_id).fetch_all(pool).await?;
        rows.iter().map(memory_from_row).collect()
    }

    pub async fn list_by_entity(&self, pool: &PgPool, project_id: Uuid, entity_id: &str) -> MemoryResult<Vec<Memory>> {
        let query = format!(
            r#"SELECT {SELECT_MEMORY_COLUMNS} FROM memories
               WHERE project_id = $1 AND entity_id = $2
               ORDER BY created_at DESC"#
        );
        let rows = sqlx::query(&query).bind(project_id).bind(entity_id).fetch_all(pool).await?;
        rows.iter().map(memory_from_row).collect()
    }

    /// `Memory.export` (spec §4.4): ordered by `created_at ASC` for
    /// reproducibility, streamed rather than materialized so large tenants
    /// don't force the whole export into memory at once.
    pub fn export<'a>(
        &'a self,
        pool: &'a PgPool,
        project_id: Uuid,
        filters: ExportFilters,
    ) -> impl Stream<Item = MemoryResult<Memory>> + 'a {
        // A `'static` literal rather than `format!` + `SELECT_MEMORY_COLUMNS`: the
        // stream borrows the query string for its whole lifetime, which a
        // locally formatted `String` can't satisfy.
        const EXPORT_QUERY: &str = r#"
            SELECT
                memories.id, memories.project_id, memories.namespace, memories.agent_id,
                memories.content, memories.content_hash, memories.embedding, memories.scope,
                memories.memory_type, memories.is_deprecated, memories.superseded_by,
                memories.deprecation_reason, memories.helpful_votes, memories.harmful_votes,
                memories.ttl_seconds, memories.expires_at, memories.session_id, memories.entity_id,
                memories.sequence_number, memories.metadata, memories.created_at, memories.updated_at,
                COALESCE(
                    (SELECT array_agg(shared_agent_id) FROM memory_shared_agents
                     WHERE memory_shared_agents.memory_id = memories.id),
                    ARRAY[]::text[]
                ) AS shared_with
            FROM memories
            WHERE project_id = $1
              AND ($2::text IS NULL OR namespace = $2)
              AND ($3::text IS NULL OR agent_id = $3)
            ORDER BY created_at ASC
        "#;
        sqlx::query(EXPORT_QUERY)
            .bind(project_id)
            .bind(filters.namespace)
            .bind(filters.agent_id)
            .fetch(pool)
            .map(|row| row.map_err(MemoryError::from).and_then(|r| memory_from_row(&r)))
    }

    pub fn embedding_service(&self) -> &Arc<EmbeddingService> {
        &self.embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_ids_are_32_char_tokens() {
        let id = new_memory_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn acl_predicate_references_expected_param() {
        let predicate = MemoryRepository::acl_predicate(8);
        assert!(predicate.contains("$8"));
        assert!(predicate.contains("agent-shared"));
    }
}
