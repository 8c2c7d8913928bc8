use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    LimitExceeded { retry_after_seconds: u64 },

    #[error("rate limiter backend error: {0}")]
    Backend(String),
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;
