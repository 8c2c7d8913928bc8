use thiserror::Error;

/// Errors surfaced by the persistent store layer.
///
/// Repository crates built on top of `aegis-database` convert these into
/// their own domain error kinds (see spec §7); this enum stays narrowly
/// about store/connectivity failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pgvector extension is not installed on the target database")]
    PgVectorMissing,
}

pub type StoreResult<T> = Result<T, StoreError>;
