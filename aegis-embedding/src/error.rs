use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable after retries: {0}")]
    ExternalServiceUnavailable(String),

    #[error("embedding provider returned malformed response: {0}")]
    MalformedResponse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("missing provider credential: {0}")]
    MissingCredential(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
