//! Feature tracker state machine (spec §4.5): `not_started → in_progress →
//! testing → {complete | failed}`, either leaf can move to/from `blocked`.
//! `mark_complete` requires every test step passing and a `verified_by`.

use crate::error::{AceError, AceResult};
use aegis_database::models::{FeatureStatus, FeatureTracker};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeatureInput {
    pub feature_id: String,
    pub description: String,
    #[serde(default)]
    pub test_steps: Vec<String>,
}

fn allowed_transition(from: FeatureStatus, to: FeatureStatus) -> bool {
    use FeatureStatus::*;
    matches!(
        (from, to),
        (NotStarted, InProgress)
            | (InProgress, Testing)
            | (Testing, Complete)
            | (Testing, Failed)
            | (NotStarted, Blocked)
            | (InProgress, Blocked)
            | (Testing, Blocked)
            | (Blocked, NotStarted)
            | (Blocked, InProgress)
            | (Blocked, Testing)
    )
}

fn row_to_feature(row: &sqlx::postgres::PgRow) -> AceResult<FeatureTracker> {
    let status: String = row.try_get("status")?;
    Ok(FeatureTracker {
        feature_id: row.try_get("feature_id")?,
        project_id: row.try_get("project_id")?,
        description: row.try_get("description")?,
        test_steps: serde_json::from_value(row.try_get("test_steps")?).unwrap_or_default(),
        passed_steps: serde_json::from_value(row.try_get("passed_steps")?).unwrap_or_default(),
        status: status
            .parse()
            .map_err(|e: aegis_database::models::ParseEnumError| AceError::Validation(e.to_string()))?,
        passes: row.try_get("passes")?,
        failure_reason: row.try_get("failure_reason")?,
        verified_by: row.try_get("verified_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct FeatureRepository;

impl FeatureRepository {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        input: CreateFeatureInput,
    ) -> AceResult<FeatureTracker> {
        sqlx::query(
            r#"INSERT INTO feature_tracker (feature_id, project_id, description, test_steps)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&input.feature_id)
        .bind(project_id)
        .bind(serde_json::to_value(&input.test_steps)?)
        .execute(&mut **tx)
        .await?;

        Self::get_tx(tx, project_id, &input.feature_id).await
    }

    pub async fn get(pool: &PgPool, project_id: Uuid, feature_id: &str) -> AceResult<FeatureTracker> {
        let row = sqlx::query("SELECT * FROM feature_tracker WHERE project_id = $1 AND feature_id = $2")
            .bind(project_id)
            .bind(feature_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AceError::NotFound(format!("feature {feature_id} not found")))?;
        row_to_feature(&row)
    }

    /// `GET /ace/feature` (spec §6): every feature tracked for the
    /// project, newest first.
    pub async fn list(pool: &PgPool, project_id: Uuid) -> AceResult<Vec<FeatureTracker>> {
        let rows = sqlx::query("SELECT * FROM feature_tracker WHERE project_id = $1 ORDER BY created_at DESC")
            .bind(project_id)
            .fetch_all(pool)
            .await?;
        rows.iter().map(row_to_feature).collect()
    }

    async fn get_tx(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, feature_id: &str) -> AceResult<FeatureTracker> {
        let row = sqlx::query("SELECT * FROM feature_tracker WHERE project_id = $1 AND feature_id = $2")
            .bind(project_id)
            .bind(feature_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AceError::NotFound(format!("feature {feature_id} not found")))?;
        row_to_feature(&row)
    }

    async fn transition(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        feature_id: &str,
        to: FeatureStatus,
    ) -> AceResult<FeatureTracker> {
        let current = Self::get_tx(tx, project_id, feature_id).await?;
        if !allowed_transition(current.status, to) {
            return Err(AceError::InvalidTransition(format!(
                "{} -> {to} is not a valid feature transition",
                current.status
            )));
        }
        sqlx::query("UPDATE feature_tracker SET status = $1, updated_at = now() WHERE project_id = $2 AND feature_id = $3")
            .bind(to.to_string())
            .bind(project_id)
            .bind(feature_id)
            .execute(&mut **tx)
            .await?;
        Self::get_tx(tx, project_id, feature_id).await
    }

    pub async fn start(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, feature_id: &str) -> AceResult<FeatureTracker> {
        Self::transition(tx, project_id, feature_id, FeatureStatus::InProgress).await
    }

    pub async fn begin_testing(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, feature_id: &str) -> AceResult<FeatureTracker> {
        Self::transition(tx, project_id, feature_id, FeatureStatus::Testing).await
    }

    pub async fn block(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, feature_id: &str) -> AceResult<FeatureTracker> {
        Self::transition(tx, project_id, feature_id, FeatureStatus::Blocked).await
    }

    pub async fn unblock(tx: &mut Transaction<'_, Postgres>, project_id: Uuid, feature_id: &str, to: FeatureStatus) -> AceResult<FeatureTracker> {
        if matches!(to, FeatureStatus::Complete | FeatureStatus::Failed) {
            return Err(AceError::InvalidTransition(format!(
                "blocked cannot resume directly into {to}"
            )));
        }
        Self::transition(tx, project_id, feature_id, to).await
    }

    /// Requires every test step to pass (spec §4.5: "`mark_complete`
    /// requires all `test_steps` passing and `verified_by` set").
    pub async fn mark_complete(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        feature_id: &str,
        verified_by: String,
    ) -> AceResult<FeatureTracker> {
        let current = Self::get_tx(tx, project_id, feature_id).await?;
        if current.status != FeatureStatus::Testing {
            return Err(AceError::InvalidTransition(format!(
                "{} -> complete is not a valid feature transition",
                current.status
            )));
        }
        if !current.passes {
            return Err(AceError::Validation(
                "feature cannot be marked complete before its test steps pass".into(),
            ));
        }

        sqlx::query(
            r#"UPDATE feature_tracker SET status = $1, verified_by = $2, updated_at = now()
               WHERE project_id = $3 AND feature_id = $4"#,
        )
        .bind(FeatureStatus::Complete.to_string())
        .bind(verified_by)
        .bind(project_id)
        .bind(feature_id)
        .execute(&mut **tx)
        .await?;

        Self::get_tx(tx, project_id, feature_id).await
    }

    pub async fn mark_failed(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        feature_id: &str,
        reason: String,
    ) -> AceResult<FeatureTracker> {
        let current = Self::get_tx(tx, project_id, feature_id).await?;
        if current.status != FeatureStatus::Testing {
            return Err(AceError::InvalidTransition(format!(
                "{} -> failed is not a valid feature transition",
                current.status
            )));
        }

        sqlx::query(
            r#"UPDATE feature_tracker SET status = $1, failure_reason = $2, updated_at = now()
               WHERE project_id = $3 AND feature_id = $4"#,
        )
        .bind(FeatureStatus::Failed.to_string())
        .bind(reason)
        .bind(project_id)
        .bind(feature_id)
        .execute(&mut **tx)
        .await?;

        Self::get_tx(tx, project_id, feature_id).await
    }

    /// Records a single named test step's pass/fail outcome. `passes`
    /// tracks per-step completion in `passed_steps` rather than AND-folding
    /// the aggregate column — that column defaults to `false`, so folding
    /// against it can never climb back to `true` once any step fails, and
    /// never reaches `true` at all on a feature's very first recorded step.
    /// `passes` becomes true once every entry in `test_steps` has a
    /// matching passing entry in `passed_steps` (vacuously true when
    /// `test_steps` is empty).
    pub async fn record_test_result(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        feature_id: &str,
        step: &str,
        step_passed: bool,
    ) -> AceResult<FeatureTracker> {
        let current = Self::get_tx(tx, project_id, feature_id).await?;
        if !current.test_steps.iter().any(|s| s == step) {
            return Err(AceError::Validation(format!(
                "{step:?} is not one of this feature's test_steps"
            )));
        }

        let mut passed_steps: HashSet<String> = current.passed_steps.into_iter().collect();
        if step_passed {
            passed_steps.insert(step.to_string());
        } else {
            passed_steps.remove(step);
        }
        let passes = current.test_steps.iter().all(|s| passed_steps.contains(s));
        let passed_steps: Vec<String> = passed_steps.into_iter().collect();

        sqlx::query(
            "UPDATE feature_tracker SET passed_steps = $1, passes = $2, updated_at = now()
             WHERE project_id = $3 AND feature_id = $4",
        )
        .bind(serde_json::to_value(&passed_steps)?)
        .bind(passes)
        .bind(project_id)
        .bind(feature_id)
        .execute(&mut **tx)
        .await?;
        Self::get_tx(tx, project_id, feature_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FeatureStatus::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(allowed_transition(NotStarted, InProgress));
        assert!(allowed_transition(InProgress, Testing));
        assert!(allowed_transition(Testing, Complete));
        assert!(allowed_transition(Testing, Failed));
    }

    #[test]
    fn blocked_round_trips() {
        assert!(allowed_transition(InProgress, Blocked));
        assert!(allowed_transition(Blocked, InProgress));
        assert!(!allowed_transition(Blocked, Complete));
    }

    #[test]
    fn terminal_states_do_not_transition_further() {
        assert!(!allowed_transition(Complete, InProgress));
        assert!(!allowed_transition(Failed, Testing));
    }
}
