//! ACE runs and auto-curation (spec §4.5): `start_run` opens a row,
//! `complete_run` closes it and drives the feedback loop — auto-vote on
//! every memory the run used, plus a deterministic failure reflection.

use crate::error::{AceError, AceResult};
use crate::reflection::{ReflectionInput, ReflectionRepository};
use crate::vote::VoteRepository;
use aegis_database::models::{AceRun, RunOutcome, Vote};
use aegis_memory::MemoryRepository;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct StartRunInput {
    pub agent_id: String,
    pub task: String,
}

fn row_to_run(row: &sqlx::postgres::PgRow) -> AceResult<AceRun> {
    let outcome: Option<String> = row.try_get("outcome")?;
    Ok(AceRun {
        run_id: row.try_get("run_id")?,
        project_id: row.try_get("project_id")?,
        agent_id: row.try_get("agent_id")?,
        task: row.try_get("task")?,
        memories_used: serde_json::from_value(row.try_get("memories_used")?).unwrap_or_default(),
        outcome: outcome
            .map(|o| o.parse().map_err(|e: aegis_database::models::ParseEnumError| AceError::Validation(e.to_string())))
            .transpose()?,
        error_pattern: row.try_get("error_pattern")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Deterministic, server-generated failure summary (spec §4.5: not a
/// model call, no randomness, so S5 reproduces the same reflection text
/// for the same inputs).
fn failure_reflection_content(task: &str, error_pattern: Option<&str>) -> String {
    match error_pattern {
        Some(pattern) => format!("Run failed on task \"{task}\": {pattern}"),
        None => format!("Run failed on task \"{task}\" with no reported error pattern"),
    }
}

pub struct RunRepository;

impl RunRepository {
    pub async fn start_run(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        input: StartRunInput,
    ) -> AceResult<AceRun> {
        let row = sqlx::query(
            r#"INSERT INTO ace_runs (project_id, agent_id, task)
               VALUES ($1, $2, $3)
               RETURNING run_id, project_id, agent_id, task, memories_used, outcome,
                         error_pattern, started_at, completed_at"#,
        )
        .bind(project_id)
        .bind(&input.agent_id)
        .bind(&input.task)
        .fetch_one(&mut **tx)
        .await?;

        let run = row_to_run(&row)?;
        info!(run_id = %run.run_id, agent_id = %run.agent_id, "run started");
        Ok(run)
    }

    pub async fn get(pool: &PgPool, project_id: Uuid, run_id: Uuid) -> AceResult<AceRun> {
        let row = sqlx::query("SELECT * FROM ace_runs WHERE project_id = $1 AND run_id = $2")
            .bind(project_id)
            .bind(run_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AceError::NotFound(format!("run {run_id} not found")))?;
        row_to_run(&row)
    }

    /// Closes the run and drives auto-curation. On `success`, votes
    /// `helpful` on every id in `memories_used`. On `failure`, votes
    /// `harmful` on every id and writes one deterministic reflection
    /// memory with `source_trajectory_id = run_id` (spec S5). `partial`
    /// closes the run without any auto-vote or reflection.
    pub async fn complete_run(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        memory_repo: &MemoryRepository,
        run_id: Uuid,
        outcome: RunOutcome,
        memories_used: Vec<String>,
        error_pattern: Option<String>,
    ) -> AceResult<AceRun> {
        let current = Self::get_tx(tx, project_id, run_id).await?;
        if current.completed_at.is_some() {
            return Err(AceError::InvalidTransition(format!(
                "run {run_id} is already complete"
            )));
        }

        sqlx::query(
            r#"UPDATE ace_runs SET outcome = $1, memories_used = $2, error_pattern = $3, completed_at = now()
               WHERE project_id = $4 AND run_id = $5"#,
        )
        .bind(outcome.to_string())
        .bind(serde_json::to_value(&memories_used)?)
        .bind(&error_pattern)
        .bind(project_id)
        .bind(run_id)
        .execute(&mut **tx)
        .await?;

        match outcome {
            RunOutcome::Success => {
                for memory_id in &memories_used {
                    VoteRepository::vote(
                        tx,
                        project_id,
                        memory_id,
                        &current.agent_id,
                        Vote::Helpful,
                        Some(current.task.clone()),
                        Some(run_id.to_string()),
                    )
                    .await?;
                }
            }
            RunOutcome::Failure => {
                for memory_id in &memories_used {
                    VoteRepository::vote(
                        tx,
                        project_id,
                        memory_id,
                        &current.agent_id,
                        Vote::Harmful,
                        Some(current.task.clone()),
                        Some(run_id.to_string()),
                    )
                    .await?;
                }

                let content = failure_reflection_content(&current.task, error_pattern.as_deref());
                ReflectionRepository::reflection(
                    tx,
                    project_id,
                    memory_repo,
                    ReflectionInput {
                        content,
                        agent_id: current.agent_id.clone(),
                        error_pattern: error_pattern.clone(),
                        correct_approach: None,
                        source_trajectory_id: Some(run_id.to_string()),
                        applicable_contexts: Vec::new(),
                    },
                )
                .await?;
            }
            RunOutcome::Partial => {}
        }

        sqlx::query(
            r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
               VALUES ($1, $2, $3, $4, 'run_completed', $5)"#,
        )
        .bind(run_id.to_string())
        .bind(project_id)
        .bind("ace_runs")
        .bind(&current.agent_id)
        .bind(serde_json::json!({
            "run_id": run_id,
            "outcome": outcome.to_string(),
            "memories_used": memories_used,
        }))
        .execute(&mut **tx)
        .await?;

        info!(run_id = %run_id, ?outcome, "run completed");
        Self::get_tx(tx, project_id, run_id).await
    }

    async fn get_tx(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, run_id: Uuid) -> AceResult<AceRun> {
        let row = sqlx::query("SELECT * FROM ace_runs WHERE project_id = $1 AND run_id = $2")
            .bind(project_id)
            .bind(run_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AceError::NotFound(format!("run {run_id} not found")))?;
        row_to_run(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reflection_is_deterministic() {
        let a = failure_reflection_content("fix bug", Some("NullPointerException"));
        let b = failure_reflection_content("fix bug", Some("NullPointerException"));
        assert_eq!(a, b);
        assert!(a.contains("fix bug"));
        assert!(a.contains("NullPointerException"));
    }

    #[test]
    fn failure_reflection_handles_missing_error_pattern() {
        let content = failure_reflection_content("fix bug", None);
        assert!(content.contains("no reported error pattern"));
    }
}
