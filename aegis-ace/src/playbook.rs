//! Playbook retrieval (spec §4.5): the same ACL predicate as semantic
//! search, filtered by `memory_type`/`effectiveness`, ranked by a fixed
//! deterministic composite of similarity, effectiveness, and recency.

use crate::error::AceResult;
use aegis_database::models::{Memory, MemoryType};
use aegis_memory::{memory_from_row, MemoryRepository, SELECT_MEMORY_COLUMNS};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Effectiveness weight in the composite rank key. Fixed so that, for
/// memories tied on semantic similarity, higher effectiveness always wins
/// (spec §4.5): similarity ranges over `[0, 1]`, effectiveness over
/// `(-1, 1)`, so a weight below `1 / 2` could still be outranked by a
/// similarity gap — callers must not read too much into the exact value,
/// only its monotone ordering role.
const EFFECTIVENESS_WEIGHT: f64 = 0.25;

/// Recency weight, smaller than the effectiveness weight so recency only
/// breaks ties left after similarity and effectiveness.
const RECENCY_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct PlaybookQuery {
    pub query: String,
    pub agent_id: String,
    pub namespace: Option<String>,
    pub include_types: Vec<MemoryType>,
    pub min_effectiveness: f64,
    pub top_k: i64,
}

#[derive(Debug, Clone)]
pub struct PlaybookHit {
    pub memory: Memory,
    pub similarity: f64,
    pub rank_key: f64,
}

pub struct PlaybookRepository;

impl PlaybookRepository {
    pub async fn playbook(
        memory_repo: &MemoryRepository,
        pool: &PgPool,
        project_id: Uuid,
        query: PlaybookQuery,
    ) -> AceResult<Vec<PlaybookHit>> {
        if query.include_types.is_empty() {
            return Ok(Vec::new());
        }
        let namespace = query.namespace.clone().unwrap_or_else(|| "default".to_string());
        let query_embedding = memory_repo.embedding_service().embed(pool, &query.query).await?;
        let include_types: Vec<String> = query.include_types.iter().map(|t| t.to_string()).collect();

        let sql = format!(
            r#"
            SELECT {SELECT_MEMORY_COLUMNS},
                   (1.0 - (memories.embedding <=> $1)) AS similarity,
                   (
                       (helpful_votes - harmful_votes)::double precision
                       / (helpful_votes + harmful_votes + 1)::double precision
                   ) AS effectiveness,
                   (1.0 / (1.0 + extract(epoch FROM now() - memories.created_at) / 86400.0 / 30.0)) AS recency_bucket
            FROM memories
            WHERE memories.project_id = $2
              AND memories.namespace = $3
              AND memories.memory_type = ANY($4)
              AND NOT memories.is_deprecated
              AND (memories.expires_at IS NULL OR memories.expires_at > now())
              AND (
                  (helpful_votes - harmful_votes)::double precision
                  / (helpful_votes + harmful_votes + 1)::double precision
              ) >= $5
              AND {acl}
            ORDER BY
                (1.0 - (memories.embedding <=> $1))
                    + {w_e} * ((helpful_votes - harmful_votes)::double precision / (helpful_votes + harmful_votes + 1)::double precision)
                    + {w_r} * (1.0 / (1.0 + extract(epoch FROM now() - memories.created_at) / 86400.0 / 30.0))
                DESC,
                effectiveness DESC,
                memories.created_at DESC,
                memories.id ASC
            LIMIT $6
            "#,
            acl = MemoryRepository::acl_predicate(7),
            w_e = EFFECTIVENESS_WEIGHT,
            w_r = RECENCY_WEIGHT,
        );

        let rows = sqlx::query(&sql)
            .bind(pgvector::Vector::from(query_embedding))
            .bind(project_id)
            .bind(&namespace)
            .bind(&include_types)
            .bind(query.min_effectiveness)
            .bind(query.top_k)
            .bind(&query.agent_id)
            .fetch_all(pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory = memory_from_row(row).map_err(crate::error::AceError::from)?;
            let similarity: f64 = row.try_get("similarity")?;
            let effectiveness: f64 = row.try_get("effectiveness")?;
            let recency_bucket: f64 = row.try_get("recency_bucket")?;
            let rank_key = similarity + EFFECTIVENESS_WEIGHT * effectiveness + RECENCY_WEIGHT * recency_bucket;
            hits.push(PlaybookHit { memory, similarity, rank_key });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_effectiveness_breaks_similarity_ties() {
        let base_similarity = 0.8;
        let low = base_similarity + EFFECTIVENESS_WEIGHT * -0.5 + RECENCY_WEIGHT * 0.5;
        let high = base_similarity + EFFECTIVENESS_WEIGHT * 0.5 + RECENCY_WEIGHT * 0.5;
        assert!(high > low);
    }

    #[test]
    fn empty_include_types_short_circuits() {
        let query = PlaybookQuery {
            query: "x".into(),
            agent_id: "a".into(),
            namespace: None,
            include_types: Vec::new(),
            min_effectiveness: 0.0,
            top_k: 10,
        };
        assert!(query.include_types.is_empty());
    }
}
