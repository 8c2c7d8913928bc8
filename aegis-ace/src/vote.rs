//! Vote tallies (spec §4.5): append-only history plus an atomically
//! incremented counter on the memory row. Duplicate votes from the same
//! voter are permitted and additive — dedup is policy, not enforced here.

use crate::error::AceResult;
use aegis_database::models::Vote;
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

pub struct VoteRepository;

impl VoteRepository {
    /// 1. Append `VoteHistory` row. 2. Single atomic `UPDATE ... SET
    /// counter = counter + 1` (never read-modify-write, spec §5). 3. Emit
    /// the `voted_helpful`/`voted_harmful` event.
    pub async fn vote(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_id: &str,
        voter_agent_id: &str,
        vote: Vote,
        context: Option<String>,
        task_id: Option<String>,
    ) -> AceResult<()> {
        sqlx::query(
            r#"INSERT INTO vote_history (memory_id, voter_agent_id, vote, context, task_id)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(memory_id)
        .bind(voter_agent_id)
        .bind(vote.to_string())
        .bind(&context)
        .bind(&task_id)
        .execute(&mut **tx)
        .await?;

        let column = match vote {
            Vote::Helpful => "helpful_votes",
            Vote::Harmful => "harmful_votes",
        };
        let sql = format!(
            "UPDATE memories SET {column} = {column} + 1, updated_at = now() \
             WHERE id = $1 AND project_id = $2"
        );
        sqlx::query(&sql).bind(memory_id).bind(project_id).execute(&mut **tx).await?;

        let event_type = match vote {
            Vote::Helpful => "voted_helpful",
            Vote::Harmful => "voted_harmful",
        };
        sqlx::query(
            r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
               SELECT $1, $2, namespace, $3, $4, $5 FROM memories WHERE id = $1 AND project_id = $2"#,
        )
        .bind(memory_id)
        .bind(project_id)
        .bind(voter_agent_id)
        .bind(event_type)
        .bind(serde_json::json!({ "voter_agent_id": voter_agent_id, "task_id": task_id }))
        .execute(&mut **tx)
        .await?;

        info!(memory_id, voter_agent_id, ?vote, "recorded vote");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_selection_matches_vote_kind() {
        // Exercises the match arm directly; the SQL string construction is
        // covered end-to-end by the ACE integration tests against a live
        // database.
        let helpful_column = match Vote::Helpful {
            Vote::Helpful => "helpful_votes",
            Vote::Harmful => "harmful_votes",
        };
        assert_eq!(helpful_column, "helpful_votes");
    }
}
