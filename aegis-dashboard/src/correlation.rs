//! Correlation between memory effectiveness and run success rate (spec
//! §4.7): point-biserial correlation over `(effectiveness, run succeeded)`
//! pairs gathered from completed runs, below a fixed minimum sample size
//! the result is `insufficient_data` rather than a misleadingly precise
//! number from a handful of runs.

use crate::error::DashboardResult;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Below this many (run, memory) pairs, point-biserial correlation is too
/// noisy to report; a fixed constant keeps the threshold deterministic
/// and comparable across tenants.
pub const MIN_SAMPLE_SIZE: usize = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrelationReport {
    InsufficientData { sample_size: usize, required: usize },
    Computed { sample_size: usize, coefficient: f64 },
}

pub struct CorrelationQuery;

impl CorrelationQuery {
    pub async fn effectiveness_vs_run_success(pool: &PgPool, project_id: Uuid) -> DashboardResult<CorrelationReport> {
        let rows = sqlx::query(
            r#"
            SELECT
                (m.helpful_votes - m.harmful_votes)::double precision
                    / (m.helpful_votes + m.harmful_votes + 1)::double precision AS effectiveness,
                (r.outcome = 'success') AS succeeded
            FROM ace_runs r
            CROSS JOIN LATERAL jsonb_array_elements_text(r.memories_used) AS used(memory_id)
            JOIN memories m ON m.id = used.memory_id AND m.project_id = r.project_id
            WHERE r.project_id = $1 AND r.outcome IN ('success', 'failure')
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in &rows {
            let effectiveness: f64 = row.try_get("effectiveness")?;
            let succeeded: bool = row.try_get("succeeded")?;
            pairs.push((effectiveness, succeeded));
        }

        Ok(point_biserial(&pairs))
    }
}

fn point_biserial(pairs: &[(f64, bool)]) -> CorrelationReport {
    let n = pairs.len();
    if n < MIN_SAMPLE_SIZE {
        return CorrelationReport::InsufficientData { sample_size: n, required: MIN_SAMPLE_SIZE };
    }

    let successes: Vec<f64> = pairs.iter().filter(|(_, s)| *s).map(|(e, _)| *e).collect();
    let failures: Vec<f64> = pairs.iter().filter(|(_, s)| !*s).map(|(e, _)| *e).collect();

    if successes.is_empty() || failures.is_empty() {
        // No variance in the binary variable: correlation is undefined,
        // reported as zero rather than NaN.
        return CorrelationReport::Computed { sample_size: n, coefficient: 0.0 };
    }

    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let m1 = mean(&successes);
    let m0 = mean(&failures);

    let all: Vec<f64> = pairs.iter().map(|(e, _)| *e).collect();
    let grand_mean = mean(&all);
    let variance = all.iter().map(|e| (e - grand_mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return CorrelationReport::Computed { sample_size: n, coefficient: 0.0 };
    }

    let p = successes.len() as f64 / n as f64;
    let q = 1.0 - p;
    let coefficient = ((m1 - m0) / std_dev) * (p * q).sqrt();

    CorrelationReport::Computed { sample_size: n, coefficient }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_insufficient_data() {
        let pairs: Vec<(f64, bool)> = (0..10).map(|i| (i as f64, i % 2 == 0)).collect();
        match point_biserial(&pairs) {
            CorrelationReport::InsufficientData { sample_size, required } => {
                assert_eq!(sample_size, 10);
                assert_eq!(required, MIN_SAMPLE_SIZE);
            }
            _ => panic!("expected insufficient data"),
        }
    }

    #[test]
    fn perfect_separation_yields_strong_positive_correlation() {
        let mut pairs = Vec::new();
        for _ in 0..20 {
            pairs.push((0.9, true));
            pairs.push((-0.9, false));
        }
        match point_biserial(&pairs) {
            CorrelationReport::Computed { coefficient, sample_size } => {
                assert_eq!(sample_size, 40);
                assert!(coefficient > 0.9, "expected strong positive correlation, got {coefficient}");
            }
            _ => panic!("expected a computed coefficient"),
        }
    }

    #[test]
    fn no_variance_in_outcome_is_zero_not_nan() {
        let pairs: Vec<(f64, bool)> = (0..40).map(|i| (i as f64, true)).collect();
        match point_biserial(&pairs) {
            CorrelationReport::Computed { coefficient, .. } => assert_eq!(coefficient, 0.0),
            _ => panic!("expected a computed coefficient"),
        }
    }
}
