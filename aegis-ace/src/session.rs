//! Session state machine (spec §4.5): `active → paused ↔ active`,
//! `active → completed`, `active → failed`; once `completed`/`failed` no
//! further mutation is accepted.

use crate::error::{AceError, AceResult};
use aegis_database::models::{BlockedItem, SessionProgress, SessionStatus};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionInput {
    pub session_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub last_action: Option<String>,
}

/// Every field is a shallow replacement when present: absent fields leave
/// the stored column untouched (spec §4.5 "shallow merge").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPatch {
    #[serde(default)]
    pub completed: Option<Vec<String>>,
    #[serde(default)]
    pub in_progress: Option<Vec<String>>,
    #[serde(default)]
    pub next: Option<Vec<String>>,
    #[serde(default)]
    pub blocked: Option<Vec<BlockedItem>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

fn allowed_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;
    matches!(
        (from, to),
        (Active, Paused) | (Paused, Active) | (Active, Completed) | (Active, Failed)
    )
}

fn row_to_session(row: &sqlx::postgres::PgRow) -> AceResult<SessionProgress> {
    let status: Option<String> = row.try_get("status")?;
    Ok(SessionProgress {
        session_id: row.try_get("session_id")?,
        project_id: row.try_get("project_id")?,
        completed: serde_json::from_value(row.try_get("completed")?).unwrap_or_default(),
        in_progress: serde_json::from_value(row.try_get("in_progress")?).unwrap_or_default(),
        next: serde_json::from_value(row.try_get("next")?).unwrap_or_default(),
        blocked: serde_json::from_value(row.try_get("blocked")?).unwrap_or_default(),
        summary: row.try_get("summary")?,
        last_action: row.try_get("last_action")?,
        status: status
            .map(|s| s.parse().map_err(|e: aegis_database::models::ParseEnumError| AceError::Validation(e.to_string())))
            .transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct SessionRepository;

impl SessionRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        input: CreateSessionInput,
    ) -> AceResult<SessionProgress> {
        sqlx::query(
            r#"INSERT INTO session_progress (session_id, project_id, summary, last_action)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&input.session_id)
        .bind(project_id)
        .bind(&input.summary)
        .bind(&input.last_action)
        .execute(&mut **tx)
        .await?;

        Self::get_tx(tx, project_id, &input.session_id).await
    }

    pub async fn get(pool: &PgPool, project_id: Uuid, session_id: &str) -> AceResult<SessionProgress> {
        let row = sqlx::query(
            "SELECT * FROM session_progress WHERE project_id = $1 AND session_id = $2",
        )
        .bind(project_id)
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AceError::NotFound(format!("session {session_id} not found")))?;
        row_to_session(&row)
    }

    async fn get_tx(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, session_id: &str) -> AceResult<SessionProgress> {
        let row = sqlx::query(
            "SELECT * FROM session_progress WHERE project_id = $1 AND session_id = $2",
        )
        .bind(project_id)
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AceError::NotFound(format!("session {session_id} not found")))?;
        row_to_session(&row)
    }

    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        session_id: &str,
        patch: SessionPatch,
    ) -> AceResult<SessionProgress> {
        let current = Self::get_tx(tx, project_id, session_id).await?;
        let current_status = current.status.unwrap_or(SessionStatus::Active);

        if matches!(current_status, SessionStatus::Completed | SessionStatus::Failed) {
            return Err(AceError::InvalidTransition(format!(
                "session {session_id} is {current_status} and accepts no further mutation"
            )));
        }

        let new_status = match patch.status {
            Some(requested) if requested == current_status => current_status,
            Some(requested) if allowed_transition(current_status, requested) => requested,
            Some(requested) => {
                return Err(AceError::InvalidTransition(format!(
                    "{current_status} -> {requested} is not a valid session transition"
                )))
            }
            None => current_status,
        };

        let completed = patch.completed.unwrap_or(current.completed);
        let in_progress = patch.in_progress.unwrap_or(current.in_progress);
        let next = patch.next.unwrap_or(current.next);
        let blocked = patch.blocked.unwrap_or(current.blocked);
        let summary = patch.summary.or(current.summary);
        let last_action = patch.last_action.or(current.last_action);

        sqlx::query(
            r#"UPDATE session_progress SET
                   completed = $1, in_progress = $2, next = $3, blocked = $4,
                   summary = $5, last_action = $6, status = $7, updated_at = now()
               WHERE project_id = $8 AND session_id = $9"#,
        )
        .bind(serde_json::to_value(&completed)?)
        .bind(serde_json::to_value(&in_progress)?)
        .bind(serde_json::to_value(&next)?)
        .bind(serde_json::to_value(&blocked)?)
        .bind(&summary)
        .bind(&last_action)
        .bind(new_status.to_string())
        .bind(project_id)
        .bind(session_id)
        .execute(&mut **tx)
        .await?;

        Self::get_tx(tx, project_id, session_id).await
    }
}

impl From<serde_json::Error> for AceError {
    fn from(err: serde_json::Error) -> Self {
        AceError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_database::models::SessionStatus::*;

    #[test]
    fn pause_and_resume_are_allowed() {
        assert!(allowed_transition(Active, Paused));
        assert!(allowed_transition(Paused, Active));
    }

    #[test]
    fn terminal_transitions_are_one_way() {
        assert!(allowed_transition(Active, Completed));
        assert!(allowed_transition(Active, Failed));
        assert!(!allowed_transition(Completed, Active));
        assert!(!allowed_transition(Failed, Active));
    }

    #[test]
    fn paused_cannot_jump_to_terminal_states() {
        assert!(!allowed_transition(Paused, Completed));
        assert!(!allowed_transition(Paused, Failed));
    }
}
