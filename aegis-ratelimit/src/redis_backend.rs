//! Distributed sliding-window limiter backed by Redis sorted sets, for
//! deployments running more than one `aegis-server` process against a
//! shared limit (spec §4.3). Each project gets two sorted sets keyed by
//! request timestamp; `ZREMRANGEBYSCORE` prunes entries older than the
//! window, `ZCARD` counts what remains, `ZADD` records the new request.

use crate::backend::{CheckOutcome, Remaining, RateLimiterBackend};
use crate::config::RateLimitConfig;
use crate::error::{RateLimitError, RateLimitResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct RedisRateLimiter {
    config: RateLimitConfig,
    conn: ConnectionManager,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str, config: RateLimitConfig) -> RateLimitResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        Ok(Self { config, conn })
    }

    fn minute_key(project_id: &str) -> String {
        format!("ratelimit:{project_id}:minute")
    }

    fn hour_key(project_id: &str) -> String {
        format!("ratelimit:{project_id}:hour")
    }

    async fn window_count(
        conn: &mut ConnectionManager,
        key: &str,
        now_millis: i64,
        window_millis: i64,
    ) -> RateLimitResult<u32> {
        let floor = now_millis - window_millis;
        let _: () = conn
            .zrembyscore(key, 0, floor)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let count: u32 = conn.zcard(key).await.map_err(|e| RateLimitError::Backend(e.to_string()))?;
        Ok(count)
    }
}

#[async_trait]
impl RateLimiterBackend for RedisRateLimiter {
    async fn check(&self, project_id: &str, now: DateTime<Utc>) -> RateLimitResult<CheckOutcome> {
        let mut conn = self.conn.clone();
        let now_millis = now.timestamp_millis();
        let minute_key = Self::minute_key(project_id);
        let hour_key = Self::hour_key(project_id);

        let minute_count = Self::window_count(&mut conn, &minute_key, now_millis, 60_000).await?;
        let hour_count = Self::window_count(&mut conn, &hour_key, now_millis, 3_600_000).await?;
        let minute_limit = self.config.per_minute + self.config.burst;

        if minute_count >= minute_limit || hour_count >= self.config.per_hour {
            return Ok(CheckOutcome {
                allowed: false,
                retry_after_seconds: if minute_count >= minute_limit { 60 } else { 3600 },
                limit_minute: minute_limit,
                limit_hour: self.config.per_hour,
                remaining_minute: minute_limit.saturating_sub(minute_count),
                remaining_hour: self.config.per_hour.saturating_sub(hour_count),
            });
        }

        let member = format!("{now_millis}-{project_id}");
        let _: () = conn
            .zadd(&minute_key, &member, now_millis)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let _: () = conn
            .zadd(&hour_key, &member, now_millis)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let _: () = conn
            .expire(&minute_key, 60)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let _: () = conn
            .expire(&hour_key, 3600)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        Ok(CheckOutcome {
            allowed: true,
            retry_after_seconds: 0,
            limit_minute: minute_limit,
            limit_hour: self.config.per_hour,
            remaining_minute: minute_limit.saturating_sub(minute_count + 1),
            remaining_hour: self.config.per_hour.saturating_sub(hour_count + 1),
        })
    }

    async fn get_remaining(&self, project_id: &str, now: DateTime<Utc>) -> RateLimitResult<Remaining> {
        let mut conn = self.conn.clone();
        let now_millis = now.timestamp_millis();
        let minute_count = Self::window_count(&mut conn, &Self::minute_key(project_id), now_millis, 60_000).await?;
        let hour_count = Self::window_count(&mut conn, &Self::hour_key(project_id), now_millis, 3_600_000).await?;
        let minute_limit = self.config.per_minute + self.config.burst;

        Ok(Remaining {
            remaining_minute: minute_limit.saturating_sub(minute_count),
            remaining_hour: self.config.per_hour.saturating_sub(hour_count),
        })
    }
}
