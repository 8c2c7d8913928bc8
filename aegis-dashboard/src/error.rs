use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
