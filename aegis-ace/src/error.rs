use thiserror::Error;

/// Error kinds for the ACE subsystem (spec §7), a superset of
/// `MemoryError` plus `InvalidTransition` for the session/feature state
/// machines and `Conflict` for uniqueness violations delta ops can hit.
#[derive(Debug, Error)]
pub enum AceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("embedding provider unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<aegis_embedding::EmbeddingError> for AceError {
    fn from(err: aegis_embedding::EmbeddingError) -> Self {
        match err {
            aegis_embedding::EmbeddingError::ExternalServiceUnavailable(m) => {
                AceError::ExternalServiceUnavailable(m)
            }
            aegis_embedding::EmbeddingError::MalformedResponse(m) => AceError::ExternalServiceUnavailable(m),
            aegis_embedding::EmbeddingError::MissingCredential(m) => AceError::ExternalServiceUnavailable(m),
            aegis_embedding::EmbeddingError::Database(e) => AceError::Database(e),
        }
    }
}

impl From<aegis_memory::MemoryError> for AceError {
    fn from(err: aegis_memory::MemoryError) -> Self {
        match err {
            aegis_memory::MemoryError::Validation(m) => AceError::Validation(m),
            aegis_memory::MemoryError::NotFound(m) => AceError::NotFound(m),
            aegis_memory::MemoryError::ExternalServiceUnavailable(m) => {
                AceError::ExternalServiceUnavailable(m)
            }
            aegis_memory::MemoryError::Database(e) => AceError::Database(e),
        }
    }
}

pub type AceResult<T> = Result<T, AceError>;
