//! Interaction events (spec §4.6, §3): per-session causal tree of agent
//! actions, rooted at events with a null `parent_event_id`.

use crate::error::{EventsError, EventsResult};
use aegis_database::models::InteractionEvent;
use aegis_embedding::EmbeddingService;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Hard ceiling on chain length; a chain longer than this indicates a
/// cycle slipped past insertion-time validation rather than a genuinely
/// deep collaboration tree.
const MAX_CHAIN_DEPTH: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewInteractionEvent {
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub parent_event_id: Option<Uuid>,
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub embed: bool,
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> EventsResult<InteractionEvent> {
    let embedding: Option<pgvector::Vector> = row.try_get("embedding")?;
    Ok(InteractionEvent {
        event_id: row.try_get("event_id")?,
        project_id: row.try_get("project_id")?,
        session_id: row.try_get("session_id")?,
        agent_id: row.try_get("agent_id")?,
        parent_event_id: row.try_get("parent_event_id")?,
        kind: row.try_get("kind")?,
        content: row.try_get("content")?,
        embedding: embedding.map(|v| v.to_vec()),
        timestamp: row.try_get("timestamp")?,
    })
}

pub struct InteractionEventRepository {
    embedding: Arc<EmbeddingService>,
}

impl InteractionEventRepository {
    pub fn new(embedding: Arc<EmbeddingService>) -> Self {
        Self { embedding }
    }

    pub async fn insert(&self, pool: &PgPool, project_id: Uuid, input: NewInteractionEvent) -> EventsResult<InteractionEvent> {
        if let Some(parent) = input.parent_event_id {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT event_id FROM interaction_events WHERE project_id = $1 AND event_id = $2")
                    .bind(project_id)
                    .bind(parent)
                    .fetch_optional(pool)
                    .await?;
            if exists.is_none() {
                return Err(EventsError::Validation(format!("parent event {parent} not found")));
            }
        }

        let embedding = if input.embed {
            Some(pgvector::Vector::from(self.embedding.embed(pool, &input.content).await?))
        } else {
            None
        };

        let row = sqlx::query(
            r#"INSERT INTO interaction_events (project_id, session_id, agent_id, parent_event_id, kind, content, embedding)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING event_id, project_id, session_id, agent_id, parent_event_id, kind, content, embedding, timestamp"#,
        )
        .bind(project_id)
        .bind(&input.session_id)
        .bind(&input.agent_id)
        .bind(input.parent_event_id)
        .bind(&input.kind)
        .bind(&input.content)
        .bind(&embedding)
        .fetch_one(pool)
        .await?;

        row_to_event(&row)
    }

    pub async fn list_by_session(pool: &PgPool, project_id: Uuid, session_id: &str) -> EventsResult<Vec<InteractionEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM interaction_events WHERE project_id = $1 AND session_id = $2 ORDER BY timestamp ASC",
        )
        .bind(project_id)
        .bind(session_id)
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn list_by_agent(pool: &PgPool, project_id: Uuid, agent_id: &str) -> EventsResult<Vec<InteractionEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM interaction_events WHERE project_id = $1 AND agent_id = $2 ORDER BY timestamp DESC",
        )
        .bind(project_id)
        .bind(agent_id)
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    /// Embeds `query_text` and returns the nearest interaction events by
    /// cosine distance. "Filtered by visibility" (spec §4.6) means tenant
    /// scoping: interaction events carry no ACL of their own, only
    /// `project_id`.
    pub async fn search(
        &self,
        pool: &PgPool,
        project_id: Uuid,
        query_text: &str,
        top_k: i64,
    ) -> EventsResult<Vec<(InteractionEvent, f64)>> {
        let query_embedding = self.embedding.embed(pool, query_text).await?;
        let rows = sqlx::query(
            r#"SELECT *, (embedding <=> $1) AS distance FROM interaction_events
               WHERE project_id = $2 AND embedding IS NOT NULL
               ORDER BY distance ASC, timestamp DESC
               LIMIT $3"#,
        )
        .bind(pgvector::Vector::from(query_embedding))
        .bind(project_id)
        .bind(top_k)
        .fetch_all(pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let event = row_to_event(row)?;
            let distance: f64 = row.try_get("distance")?;
            hits.push((event, distance));
        }
        Ok(hits)
    }

    /// Walks `parent_event_id` links from `event_id` to its root and
    /// returns the linear chain root-first (spec §8 property 10). Guards
    /// against a cycle with a depth cap rather than trusting the data.
    pub async fn chain(pool: &PgPool, project_id: Uuid, event_id: Uuid) -> EventsResult<Vec<InteractionEvent>> {
        let mut chain = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = Some(event_id);

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(EventsError::Validation(format!(
                    "cycle detected in causal chain at event {id}"
                )));
            }
            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(EventsError::Validation(format!(
                    "causal chain exceeds maximum depth of {MAX_CHAIN_DEPTH}"
                )));
            }

            let row = sqlx::query("SELECT * FROM interaction_events WHERE project_id = $1 AND event_id = $2")
                .bind(project_id)
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| EventsError::NotFound(format!("interaction event {id} not found")))?;
            let event = row_to_event(&row)?;
            current = event.parent_event_id;
            chain.push(event);
        }

        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_chain_depth_is_reasonable() {
        assert!(MAX_CHAIN_DEPTH > 100);
    }
}
