use crate::error::RateLimitResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a `check` call, carrying everything needed to populate the
/// `X-RateLimit-*` response headers (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct CheckOutcome {
    pub allowed: bool,
    pub retry_after_seconds: u64,
    pub limit_minute: u32,
    pub limit_hour: u32,
    pub remaining_minute: u32,
    pub remaining_hour: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Remaining {
    pub remaining_minute: u32,
    pub remaining_hour: u32,
}

/// The protocol both the in-process and distributed backends satisfy
/// (spec §4.3). `now` is threaded through explicitly so tests can drive
/// the sliding window deterministically instead of depending on wall
/// clock time.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    async fn check(&self, project_id: &str, now: DateTime<Utc>) -> RateLimitResult<CheckOutcome>;
    async fn get_remaining(&self, project_id: &str, now: DateTime<Utc>) -> RateLimitResult<Remaining>;
}
