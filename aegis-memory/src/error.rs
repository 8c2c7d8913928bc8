use thiserror::Error;

/// Error kinds surfaced by the memory repository (spec §7). Callers at the
/// request boundary map these onto HTTP status codes; nothing here is
/// swallowed except where the spec explicitly says so (dedup, ACL misses,
/// TTL expiry are modeled as normal `Ok` results, not errors).
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("embedding provider unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<aegis_embedding::EmbeddingError> for MemoryError {
    fn from(err: aegis_embedding::EmbeddingError) -> Self {
        match err {
            aegis_embedding::EmbeddingError::Database(e) => MemoryError::Database(e),
            other => MemoryError::ExternalServiceUnavailable(other.to_string()),
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
