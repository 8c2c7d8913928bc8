//! Aegis Memory - Rate Limiting
//!
//! Per-project sliding-window request limiting (spec §4.3): an in-process
//! backend for single-node deployments and a Redis-backed backend for
//! multi-node deployments sharing one limit.

pub mod backend;
pub mod config;
pub mod error;
pub mod in_process;
pub mod redis_backend;

pub use backend::{CheckOutcome, RateLimiterBackend, Remaining};
pub use config::RateLimitConfig;
pub use error::{RateLimitError, RateLimitResult};
pub use in_process::InProcessRateLimiter;
pub use redis_backend::RedisRateLimiter;
