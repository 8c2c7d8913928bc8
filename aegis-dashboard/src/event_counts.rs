//! Event-type counts per time bucket (spec §4.7).

use crate::error::DashboardResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWidth {
    Hour,
    Day,
}

impl BucketWidth {
    fn trunc_unit(self) -> &'static str {
        match self {
            BucketWidth::Hour => "hour",
            BucketWidth::Day => "day",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventCountBucket {
    pub bucket_start: DateTime<Utc>,
    pub event_type: String,
    pub count: i64,
}

pub struct EventCountsQuery;

impl EventCountsQuery {
    pub async fn counts_by_type(
        pool: &PgPool,
        project_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        bucket: BucketWidth,
    ) -> DashboardResult<Vec<EventCountBucket>> {
        let sql = format!(
            r#"
            SELECT date_trunc('{unit}', created_at) AS bucket_start, event_type, count(*) AS count
            FROM memory_events
            WHERE project_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY bucket_start, event_type
            ORDER BY bucket_start ASC, event_type ASC
            "#,
            unit = bucket.trunc_unit(),
        );

        let rows = sqlx::query(&sql)
            .bind(project_id)
            .bind(since)
            .bind(until)
            .fetch_all(pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(EventCountBucket {
                bucket_start: row.try_get("bucket_start")?,
                event_type: row.try_get("event_type")?,
                count: row.try_get("count")?,
            });
        }
        Ok(out)
    }
}
