//! Auto-curation pass (spec §6 `POST /ace/curate`): deprecates memories
//! whose vote history has settled on persistently low effectiveness,
//! reusing the same `is_deprecated` flip `DeltaRepository::deprecate`
//! performs for an explicit operator-authored delta.
//!
//! Idempotent by construction rather than by an explicit time window: the
//! `WHERE NOT is_deprecated` guard means a second call in the same window
//! finds nothing left to act on and returns an empty report.

use crate::error::AceResult;
use serde::Serialize;
use sqlx::{Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

/// A memory qualifies once it has accumulated at least this many votes —
/// below this, effectiveness is too noisy a signal to act on.
const MIN_VOTES_FOR_CURATION: i64 = 5;

/// Memories whose effectiveness falls below this are curated away.
/// `Memory::effectiveness` ranges over `(-1, 1)`; this is a clearly
/// negative signal, not a tie-breaking threshold.
const EFFECTIVENESS_THRESHOLD: f64 = -0.5;

#[derive(Debug, Clone, Serialize)]
pub struct CurationReport {
    pub deprecated_ids: Vec<String>,
}

pub struct CurationRepository;

impl CurationRepository {
    pub async fn curate(tx: &mut Transaction<'_, Postgres>, project_id: Uuid) -> AceResult<CurationReport> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM memories
            WHERE project_id = $1
              AND NOT is_deprecated
              AND (helpful_votes + harmful_votes) >= $2
              AND (helpful_votes - harmful_votes)::double precision
                  / (helpful_votes + harmful_votes + 1)::double precision < $3
            "#,
        )
        .bind(project_id)
        .bind(MIN_VOTES_FOR_CURATION)
        .bind(EFFECTIVENESS_THRESHOLD)
        .fetch_all(&mut **tx)
        .await?;

        let mut deprecated_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory_id: String = row.try_get("id")?;
            sqlx::query(
                r#"UPDATE memories SET is_deprecated = true, deprecation_reason = $1, updated_at = now()
                   WHERE id = $2 AND project_id = $3"#,
            )
            .bind("auto-curated: persistently low effectiveness")
            .bind(&memory_id)
            .bind(project_id)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                r#"INSERT INTO memory_events (memory_id, project_id, namespace, agent_id, event_type, event_payload)
                   SELECT $1, $2, namespace, agent_id, 'curated', $3 FROM memories WHERE id = $1 AND project_id = $2"#,
            )
            .bind(&memory_id)
            .bind(project_id)
            .bind(serde_json::json!({ "reason": "persistently low effectiveness" }))
            .execute(&mut **tx)
            .await?;

            deprecated_ids.push(memory_id);
        }

        info!(project_id = %project_id, count = deprecated_ids.len(), "curation pass complete");
        Ok(CurationReport { deprecated_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_sane() {
        assert!(MIN_VOTES_FOR_CURATION > 0);
        assert!(EFFECTIVENESS_THRESHOLD < 0.0 && EFFECTIVENESS_THRESHOLD > -1.0);
    }
}
