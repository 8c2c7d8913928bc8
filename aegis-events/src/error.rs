use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding provider unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<aegis_memory::MemoryError> for EventsError {
    fn from(err: aegis_memory::MemoryError) -> Self {
        match err {
            aegis_memory::MemoryError::Validation(m) => EventsError::Validation(m),
            aegis_memory::MemoryError::NotFound(m) => EventsError::NotFound(m),
            aegis_memory::MemoryError::ExternalServiceUnavailable(m) => {
                EventsError::ExternalServiceUnavailable(m)
            }
            aegis_memory::MemoryError::Database(e) => EventsError::Database(e),
        }
    }
}

impl From<aegis_embedding::EmbeddingError> for EventsError {
    fn from(err: aegis_embedding::EmbeddingError) -> Self {
        match err {
            aegis_embedding::EmbeddingError::ExternalServiceUnavailable(m) => {
                EventsError::ExternalServiceUnavailable(m)
            }
            aegis_embedding::EmbeddingError::MalformedResponse(m) => {
                EventsError::ExternalServiceUnavailable(m)
            }
            aegis_embedding::EmbeddingError::MissingCredential(m) => {
                EventsError::ExternalServiceUnavailable(m)
            }
            aegis_embedding::EmbeddingError::Database(e) => EventsError::Database(e),
        }
    }
}

pub type EventsResult<T> = Result<T, EventsError>;
