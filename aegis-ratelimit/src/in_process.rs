//! Sliding-window limiter backed by an in-process map. Grounded on the
//! teacher's `api-server/src/rate_limiter.rs` `RateLimiter`/`RequestRecord`
//! pattern, generalized from a single per-IP window to per-project dual
//! windows (60s + 3600s, spec §4.3).

use crate::backend::{CheckOutcome, Remaining, RateLimiterBackend};
use crate::config::RateLimitConfig;
use crate::error::RateLimitResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Per-project request timestamps, pruned lazily on each check.
#[derive(Default)]
struct ProjectWindow {
    minute: Vec<DateTime<Utc>>,
    hour: Vec<DateTime<Utc>>,
}

pub struct InProcessRateLimiter {
    config: RateLimitConfig,
    windows: RwLock<HashMap<String, ProjectWindow>>,
}

impl InProcessRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    fn prune(window: &mut ProjectWindow, now: DateTime<Utc>) {
        let minute_floor = now - Duration::seconds(60);
        let hour_floor = now - Duration::seconds(3600);
        window.minute.retain(|t| *t > minute_floor);
        window.hour.retain(|t| *t > hour_floor);
    }
}

#[async_trait]
impl RateLimiterBackend for InProcessRateLimiter {
    async fn check(&self, project_id: &str, now: DateTime<Utc>) -> RateLimitResult<CheckOutcome> {
        let mut windows = self.windows.write();
        let window = windows.entry(project_id.to_string()).or_default();
        Self::prune(window, now);

        let minute_count = window.minute.len() as u32;
        let hour_count = window.hour.len() as u32;
        let minute_limit = self.config.per_minute + self.config.burst;

        if minute_count >= minute_limit || hour_count >= self.config.per_hour {
            let retry_after_seconds = if minute_count >= minute_limit {
                window
                    .minute
                    .first()
                    .map(|oldest| (*oldest + Duration::seconds(60) - now).num_seconds().max(1) as u64)
                    .unwrap_or(60)
            } else {
                window
                    .hour
                    .first()
                    .map(|oldest| (*oldest + Duration::seconds(3600) - now).num_seconds().max(1) as u64)
                    .unwrap_or(3600)
            };

            return Ok(CheckOutcome {
                allowed: false,
                retry_after_seconds,
                limit_minute: minute_limit,
                limit_hour: self.config.per_hour,
                remaining_minute: minute_limit.saturating_sub(minute_count),
                remaining_hour: self.config.per_hour.saturating_sub(hour_count),
            });
        }

        window.minute.push(now);
        window.hour.push(now);

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
        let mut windows = self.windows.write();
        let window = windows.entry(project_id.to_string()).or_default();
        Self::prune(window, now);

        let minute_limit = self.config.per_minute + self.config.burst;
        Ok(Remaining {
            remaining_minute: minute_limit.saturating_sub(window.minute.len() as u32),
            remaining_hour: self.config.per_hour.saturating_sub(window.hour.len() as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            per_minute: 2,
            per_hour: 100,
            burst: 0,
        }
    }

    #[tokio::test]
    async fn allows_requests_under_the_limit() {
        let limiter = InProcessRateLimiter::new(config());
        let now = Utc::now();
        let first = limiter.check("proj-a", now).await.unwrap();
        let second = limiter.check("proj-a", now).await.unwrap();
        assert!(first.allowed);
        assert!(second.allowed);
    }

    #[tokio::test]
    async fn rejects_once_minute_limit_is_hit() {
        let limiter = InProcessRateLimiter::new(config());
        let now = Utc::now();
        limiter.check("proj-a", now).await.unwrap();
        limiter.check("proj-a", now).await.unwrap();
        let third = limiter.check("proj-a", now).await.unwrap();
        assert!(!third.allowed);
        assert!(third.retry_after_seconds > 0);
    }

    #[tokio::test]
    async fn windows_are_independent_per_project() {
        let limiter = InProcessRateLimiter::new(config());
        let now = Utc::now();
        limiter.check("proj-a", now).await.unwrap();
        limiter.check("proj-a", now).await.unwrap();
        let other_project = limiter.check("proj-b", now).await.unwrap();
        assert!(other_project.allowed);
    }

    #[tokio::test]
    async fn old_entries_age_out_of_the_minute_window() {
        let limiter = InProcessRateLimiter::new(config());
        let earlier = Utc::now() - Duration::seconds(61);
        limiter.check("proj-a", earlier).await.unwrap();
        limiter.check("proj-a", earlier).await.unwrap();
        let now = earlier + Duration::seconds(61);
        let outcome = limiter.check("proj-a", now).await.unwrap();
        assert!(outcome.allowed);
    }
}
